use crate::core::state::CharacterDefinition;
use crate::core::style::StyleDescriptor;

pub const REFERENCE_FALLBACK: &str = "Match the reference image exactly.";

const FRAMELESS_COMPOSITION: &str = "Draw a single isolated spot illustration on a pure white background. ABSOLUTELY NO FRAME, NO BORDER, NO BOUNDING BOX. The image must be a free-floating sketch. **Draw the subject LARGE and CENTERED, filling approximately 80% of the canvas. Do not draw tiny figures.**";

const FRAMED_COMPOSITION: &str = "Draw exactly ONE comic panel with a clear frame. **The subject MUST fill the panel (Medium Shot). Avoid wide shots where the character looks small.**";

const FRAMELESS_NEGATIVE: &str = "frame, border, square box, bounding box, panel edges, comic panel layout, grid, rectangle border, frame lines, corner, canvas frame, tiny characters, large empty space";

const FRAMED_NEGATIVE: &str = "Do not create a grid; generate a single image. tiny characters, zoomed out";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelPrompt {
    /// Full instruction sent to the synthesizer, negative clause included.
    pub instruction: String,
    /// Style-specific forbidden terms on their own.
    pub negative: String,
}

pub fn composition_rules(frameless: bool) -> &'static str {
    if frameless {
        FRAMELESS_COMPOSITION
    } else {
        FRAMED_COMPOSITION
    }
}

pub fn negative_rules(frameless: bool) -> &'static str {
    if frameless {
        FRAMELESS_NEGATIVE
    } else {
        FRAMED_NEGATIVE
    }
}

/// Describes the protagonist. `traits` is the summary extracted from the
/// reference image and may be empty.
pub fn character_context(character: &CharacterDefinition, traits: &str) -> String {
    let traits = traits.trim();
    match (character.reference_image(), character.trimmed_description()) {
        (Some(_), Some(description)) => format!(
            "**VISUAL ANCHOR**: The attached image is the REFERENCE for the MAIN CHARACTER.\n\
             **USER INSTRUCTIONS**: {}.\n\
             **CONSISTENCY RULE**: Combine the facial features and physical build of the reference image with the specific clothing or details described by the user.\n\
             **MANDATORY TRAITS FROM IMAGE**: {}",
            description, traits
        ),
        (Some(_), None) => format!(
            "**VISUAL ANCHOR**: The attached image is the REFERENCE for the MAIN CHARACTER.\n\
             **MANDATORY TRAITS**: {}\n\
             **INSTRUCTION**: The Main Character in the generated panel MUST look identical to this reference (same face, hair, outfit).",
            if traits.is_empty() { REFERENCE_FALLBACK } else { traits }
        ),
        (None, Some(description)) => format!(
            "**MAIN CHARACTER PROFILE**: {}.\n\
             **CONSISTENCY RULE**: Maintain this specific appearance (hair, clothes, accessories) across every single panel.",
            description
        ),
        (None, None) => "**MAIN CHARACTER**: A generic user persona (keep gender/clothing consistent if generated previously).".to_string(),
    }
}

/// Builds the instruction for panel `index` (0-based). An unknown style
/// (`None`) gets no modifier and the framed composition.
pub fn build_panel_prompt(
    character: &CharacterDefinition,
    traits: &str,
    scene_description: &str,
    style: Option<&StyleDescriptor>,
    index: usize,
) -> PanelPrompt {
    let frameless = style.map_or(false, StyleDescriptor::is_frameless);
    let modifier = style.map_or("", |s| s.prompt_modifier);
    let negative = negative_rules(frameless);

    let instruction = format!(
        "**ROLE**: Professional Comic Book Artist.\n\
         \n\
         **VISUAL STYLE**: {modifier}.\n\
         \n\
         {context}\n\
         \n\
         **SCENE SCRIPT (Panel {panel})**:\n\
         {script}.\n\
         \n\
         **COMPOSITION GUIDELINES**:\n\
         1. {composition}\n\
         2. **CAMERA DISTANCE**: Use a MEDIUM SHOT by default unless the script explicitly asks for a close-up or wide shot. Ensure consistent character size across panels.\n\
         3. Focus on the MAIN CHARACTER's reaction or action described in the script.\n\
         4. If other people are in the scene, they MUST look different from the Main Character.\n\
         5. Backgrounds should be clean and match the style.\n\
         \n\
         **NEGATIVE PROMPT**:\n\
         Do not change the Main Character's outfit or hair (unless instructed). Do not add text bubbles unless specified. {negative}",
        modifier = modifier,
        context = character_context(character, traits),
        panel = index + 1,
        script = scene_description.trim(),
        composition = composition_rules(frameless),
        negative = negative,
    );

    PanelPrompt {
        instruction,
        negative: negative.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::style::{find_style, STYLES};

    const IMAGE: &str = "data:image/png;base64,AAAA";

    fn character(image: bool, description: &str) -> CharacterDefinition {
        CharacterDefinition {
            mode: None,
            image: image.then(|| IMAGE.to_string()),
            description: description.to_string(),
        }
    }

    #[test]
    fn test_image_and_description_combines_traits() {
        let ctx = character_context(&character(true, "wears a red scarf"), "short black hair, glasses");
        assert!(ctx.contains("**USER INSTRUCTIONS**: wears a red scarf."));
        assert!(ctx.contains("Combine the facial features"));
        assert!(ctx.contains("**MANDATORY TRAITS FROM IMAGE**: short black hair, glasses"));
    }

    #[test]
    fn test_whitespace_description_is_treated_as_absent() {
        let ctx = character_context(&character(true, "   \t "), "");
        assert!(!ctx.contains("USER INSTRUCTIONS"));
        assert!(ctx.contains("MUST look identical to this reference"));

        let ctx = character_context(&character(false, "  "), "");
        assert!(ctx.contains("A generic user persona"));
    }

    #[test]
    fn test_image_only_uses_traits_or_fallback() {
        let with_traits = character_context(&character(true, ""), "blue hoodie");
        assert!(with_traits.contains("**MANDATORY TRAITS**: blue hoodie"));
        assert!(!with_traits.contains(REFERENCE_FALLBACK));

        let without = character_context(&character(true, ""), "");
        assert!(without.contains("**MANDATORY TRAITS**: Match the reference image exactly."));
    }

    #[test]
    fn test_description_only() {
        let ctx = character_context(&character(false, "tall, green jacket"), "ignored");
        assert!(ctx.contains("**MAIN CHARACTER PROFILE**: tall, green jacket."));
        assert!(ctx.contains("across every single panel"));
        assert!(!ctx.contains("ignored"));
    }

    #[test]
    fn test_composition_follows_frameless_flag_for_every_style() {
        for style in STYLES {
            let prompt = build_panel_prompt(&character(false, ""), "", "A desk.", Some(style), 0);
            if style.is_frameless() {
                assert!(prompt.instruction.contains("ABSOLUTELY NO FRAME, NO BORDER"), "{}", style.id);
                assert!(prompt.instruction.contains("80% of the canvas"), "{}", style.id);
                assert!(!prompt.instruction.contains("exactly ONE comic panel"), "{}", style.id);
                assert_eq!(prompt.negative, FRAMELESS_NEGATIVE);
            } else {
                assert!(prompt.instruction.contains("exactly ONE comic panel with a clear frame"), "{}", style.id);
                assert!(prompt.instruction.contains("Do not create a grid"), "{}", style.id);
                assert!(!prompt.instruction.contains("ABSOLUTELY NO FRAME"), "{}", style.id);
            }
            assert!(prompt.instruction.contains(style.prompt_modifier));
        }
    }

    #[test]
    fn test_sections_appear_in_fixed_order() {
        let style = find_style("doodle").unwrap();
        let prompt = build_panel_prompt(&character(false, "red hoodie"), "", "She clicks settings", Some(style), 1);
        let text = &prompt.instruction;

        let order = [
            "**ROLE**",
            "**VISUAL STYLE**",
            "**MAIN CHARACTER PROFILE**",
            "**SCENE SCRIPT (Panel 2)**:\nShe clicks settings.",
            "**COMPOSITION GUIDELINES**",
            "**CAMERA DISTANCE**: Use a MEDIUM SHOT",
            "MUST look different from the Main Character",
            "**NEGATIVE PROMPT**",
            "Do not add text bubbles unless specified.",
            FRAMELESS_NEGATIVE,
        ];
        let mut last = 0;
        for needle in order {
            let pos = text[last..]
                .find(needle)
                .unwrap_or_else(|| panic!("{:?} missing or out of order", needle));
            last += pos + needle.len();
        }
        assert!(text.ends_with(FRAMELESS_NEGATIVE));
    }

    #[test]
    fn test_unknown_style_degrades_to_framed() {
        let prompt = build_panel_prompt(&character(false, ""), "", "x", None, 0);
        assert!(prompt.instruction.contains("**VISUAL STYLE**: ."));
        assert!(prompt.instruction.contains("exactly ONE comic panel"));
    }
}
