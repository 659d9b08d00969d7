use cardlink::appointments::{AppointmentForm, FormState};
use cardlink::prelude::*;
use chrono::{Duration, Local};
use dotenv::dotenv;
use std::env;
use std::sync::Arc;

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    pretty_env_logger::init();

    let cards = Cardlink::from_env(Arc::new(MemoryStore::new()))?;
    let client = cards.appointments()?;

    let name = env::args().nth(1).unwrap_or_else(|| "Ada Lovelace".to_string());
    let email = env::args().nth(2).unwrap_or_else(|| "ada@example.com".to_string());

    // Same time tomorrow
    let slot = Local::now().naive_local() + Duration::days(1);

    let mut form = AppointmentForm::new();
    form.draft.name = name;
    form.draft.email = email;
    form.draft.set_date(&slot.format("%Y-%m-%d").to_string())?;
    form.draft.set_time(&slot.format("%H:%M").to_string())?;

    match form.submit_now(&client).await {
        Ok(receipt) => {
            println!(
                "Request sent{}",
                receipt.message.map(|m| format!(": {}", m)).unwrap_or_default()
            );
            form.confirm()?;
        }
        Err(e) => {
            println!("Booking failed: {}", form.error().unwrap_or(&e.to_string()));
            return Ok(());
        }
    }

    if let FormState::Confirmed(request) = form.state() {
        println!("Confirmed {} on {} at {}", request.name, request.date, request.time.format("%H:%M"));
    }

    Ok(())
}
