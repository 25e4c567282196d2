use std::process::ExitCode;

use chrono::Utc;
use comprobante::core::*;
use comprobante::pipeline::{ArtifactStore, Processor};
use comprobante::transport::{RelayClient, RelayConfig, Transport};
use rust_decimal_macros::dec;

fn env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

#[tokio::main]
async fn main() -> ExitCode {
    let (Some(url), Some(system), Some(user), Some(password)) = (
        env("RELAY_URL"),
        env("RELAY_SYSTEM"),
        env("RELAY_USER"),
        env("RELAY_PASSWORD"),
    ) else {
        eprintln!("set RELAY_URL, RELAY_SYSTEM, RELAY_USER and RELAY_PASSWORD");
        return ExitCode::FAILURE;
    };

    let emitter = Emitter::new(
        env("EMITTER_RUC").unwrap_or_else(|| "20601234561".into()),
        "COMERCIAL ANDINA S.A.C.",
        "Av. Arequipa 1250, Lince",
        "150116",
    );

    let client = match RelayClient::new(RelayConfig::new(url, system, user, password)) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("relay client: {e}");
            return ExitCode::FAILURE;
        }
    };

    let processor = Processor::new(emitter, Transport::Relay(client), ArtifactStore::new("cpe-out"));

    let mut record = RecordBuilder::new("B001", "00000042", Utc::now().naive_local())
        .buyer(Buyer::dni("45871236", "María Quispe"))
        .line("Cuaderno A4 cuadriculado", dec!(2), dec!(5.90))
        .build()
        .expect("record should be valid");

    match processor.process(&mut record).await {
        Ok(outcome) => {
            println!("Outcome: {}", if outcome.success { "accepted" } else { "failed" });
            println!("Message: {}", outcome.message);
            if let Some(code) = &outcome.state_code {
                println!("Code:    {code}");
            }
        }
        Err(e) => {
            eprintln!("submission did not complete: {e}");
        }
    }

    let t = &record.transmission;
    println!("State:   {}", t.state.as_str());
    if let Some(path) = &t.xml_path {
        println!("XML:     {}", path.display());
    }
    if let Some(path) = &t.receipt_path {
        println!("Receipt: {}", path.display());
    }
    ExitCode::SUCCESS
}
