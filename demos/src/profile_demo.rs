use cardlink::prelude::*;
use dotenv::dotenv;
use log::info;
use std::env;
use std::sync::Arc;

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    pretty_env_logger::init();

    // Device storage survives between runs, so claims made here persist
    let store_path = env::var("CARDLINK_DEVICE_STORE").unwrap_or_else(|_| ".cardlink-device.json".to_string());
    let cards = Cardlink::from_env(Arc::new(FileStore::new(store_path)))?;
    let mut editor = cards.editor();

    let args: Vec<String> = env::args().skip(1).collect();
    match args.as_slice() {
        [flag, name] if flag == "--new" => {
            editor.create();
            editor.set_field(ProfileField::Name, name)?;
            let saved = editor.save().await?;
            println!("Created card {}", saved.key().unwrap_or_default());
        }
        [key] => match editor.open(Some(key.as_str())).await {
            Resolution::Found(record) => {
                info!("loaded {:?}", record.key());
            }
            Resolution::NotFound => {
                println!("No card named {}", key);
                return Ok(());
            }
            Resolution::Failed(message) => {
                println!("Could not load {}: {}", key, message);
                return Ok(());
            }
            Resolution::Pending | Resolution::Abandoned => return Ok(()),
        },
        _ => {
            println!("usage: profile_demo <username> | profile_demo --new <display name>");
            return Ok(());
        }
    }

    if let Some(decision) = editor.decision() {
        println!(
            "Owner: {} (claimable: {}, reason: {:?})",
            decision.is_owner, decision.claimable, decision.reason
        );
    }

    if let (Some(name), Some(card)) = (editor.contact_file_name(), editor.contact_card()) {
        println!("\n--- {} ---\n{}\n", name, card);
    }

    for link in editor.contact_links() {
        println!("{:<10} {} ({})", link.label, link.value, link.href);
    }

    if let Some(url) = editor.qr_image_url() {
        println!("Scannable code: {}", url);
    }

    Ok(())
}
