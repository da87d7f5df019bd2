/// Styles drawn as isolated spot illustrations instead of bordered panels.
pub const FRAMELESS_STYLE_IDS: &[&str] = &["corporate", "lineart", "doodle", "loose"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleDescriptor {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub prompt_modifier: &'static str,
}

impl StyleDescriptor {
    pub fn is_frameless(&self) -> bool {
        FRAMELESS_STYLE_IDS.contains(&self.id)
    }
}

pub const STYLES: &[StyleDescriptor] = &[
    StyleDescriptor {
        id: "corporate",
        name: "Modern Corp",
        description: "Clean, flat vector art. Perfect for professional presentations.",
        prompt_modifier: "flat vector art style, corporate memphis style, clean lines, minimal details, soft pastel colors, white background, professional presentation graphic, STRICTLY NO FRAME, NO BORDER, frameless, open composition, spot illustration, no background box, object only",
    },
    StyleDescriptor {
        id: "lineart",
        name: "Minimal Line",
        description: "Black & white sketchy style. Focuses purely on the scenario.",
        prompt_modifier: "minimalist black and white line art, continuous line drawing, sketch style, clean white background, ink illustration, STRICTLY NO FRAME, NO BORDER, frameless, open composition, spot illustration, no background box, object only, no canvas frame",
    },
    StyleDescriptor {
        id: "doodle",
        name: "Hand-drawn Doodle",
        description: "Playful, marker-style sketches. No borders or frames.",
        prompt_modifier: "Hand-drawn flat illustration, thick sketchy black outlines, crayon texture, simple minimalist characters, dot eyes, flat color blocks, playful professional style, Open Peeps style, isolated on white background, STRICTLY NO FRAME, NO BORDER, frameless, open composition, spot illustration, no background box, object only, no canvas frame",
    },
    StyleDescriptor {
        id: "comic",
        name: "Americana",
        description: "Bold outlines and halftones. Strong storytelling vibe.",
        prompt_modifier: "american comic book style, halftone patterns, bold black outlines, vibrant pop art colors, dramatic lighting, graphic novel panel",
    },
    StyleDescriptor {
        id: "indie",
        name: "Indie Webcomic",
        description: "Wholesome, wobbly lines & muted colors. Funny and relatable.",
        prompt_modifier: "Indie webcomic style, 4-panel comic strip aesthetic, hand-drawn wobbly thick outlines, flat muted colors, retro color palette, simple minimalist characters, dot eyes, funny and wholesome vibe",
    },
    StyleDescriptor {
        id: "loose",
        name: "Loose Ink",
        description: "Messy, expressive ink sketches. Funny and relatable.",
        prompt_modifier: "Comic strip in the style of Cassandra Calin, black and white ink sketch, loose gestural lines, messy scribble shading, minimalist character design, funny relatable situation, cute and charming, soft features, STRICTLY NO FRAME, NO BORDER, frameless, open composition, spot illustration, no background box, object only, no canvas frame",
    },
];

pub fn find_style(id: &str) -> Option<&'static StyleDescriptor> {
    STYLES.iter().find(|s| s.id == id)
}
