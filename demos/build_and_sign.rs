use std::fs;
use std::process::ExitCode;

use chrono::NaiveDate;
use comprobante::core::*;
use comprobante::sign::{CertificateBundle, Signer};
use comprobante::ubl;
use rust_decimal_macros::dec;

fn main() -> ExitCode {
    let mut args = std::env::args().skip(1);
    let (Some(p12_path), Some(password)) = (args.next(), args.next()) else {
        eprintln!("usage: build_and_sign <bundle.p12> <password>");
        return ExitCode::FAILURE;
    };

    let emitter = Emitter::new(
        "20601234561",
        "COMERCIAL ANDINA S.A.C.",
        "Av. Arequipa 1250, Lince",
        "150116",
    )
    .with_trade_name("Andina Store");

    let issued = NaiveDate::from_ymd_opt(2025, 3, 14)
        .unwrap()
        .and_hms_opt(10, 30, 0)
        .unwrap();
    let record = RecordBuilder::new("F001", "00000105", issued)
        .buyer(Buyer::ruc("20518823429", "DISTRIBUIDORA NORTE S.R.L."))
        .line("Servicio de consultoría", dec!(10), dec!(295.00))
        .build()
        .expect("record should be valid");

    // Unsigned UBL document, canonical bytes with the empty signature slot.
    let artifact = ubl::build(&emitter, &record).expect("document builds");
    println!("Built:   {} ({} bytes unsigned)", artifact.name, artifact.xml.len());

    let bundle = match CertificateBundle::from_pkcs12_file(&p12_path, &password) {
        Ok(bundle) => bundle,
        Err(e) => {
            eprintln!("cannot load {p12_path}: {e}");
            return ExitCode::FAILURE;
        }
    };
    println!("Signer:  {}", bundle.subject());

    let signer = Signer::new(bundle);
    let signed = signer.sign(&artifact.xml).expect("signing succeeds");
    println!("Digest:  {}", signed.digest);

    let out = artifact.name.xml_name();
    fs::write(&out, signed.xml.as_bytes()).expect("signed document written");
    println!("Wrote:   {out}");
    ExitCode::SUCCESS
}
