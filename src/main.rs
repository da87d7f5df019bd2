use anyhow::Result;
use storyboard::core::config::Config;
use storyboard::services::gallery::create_record_store;
use storyboard::services::{gemini, preview};
use storyboard::ui::WizardUi;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let config = match Config::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            eprintln!("Please ensure 'config.yml' exists with valid AI settings.");
            return Err(e);
        }
    };

    config.ensure_directories()?;

    if std::env::args().nth(1).as_deref() == Some("serve") {
        let store = create_record_store(&config)?;
        return preview::serve(&config, store).await;
    }

    let services = gemini::create_ai_services(&config)?;
    let ui = WizardUi::new(config, services);
    ui.run().await?;

    Ok(())
}
