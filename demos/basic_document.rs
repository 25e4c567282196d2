use chrono::NaiveDate;
use comprobante::core::*;
use rust_decimal_macros::dec;

fn main() {
    let issued = NaiveDate::from_ymd_opt(2025, 3, 14)
        .unwrap()
        .and_hms_opt(10, 30, 0)
        .unwrap();

    // Correlatives come from the allocator, one counter per series.
    let allocator = SeriesAllocator::new();
    allocator.seed("B001", 41);

    // A walk-in sale: boleta to a DNI-identified customer, prices as
    // charged (IGV included).
    let boleta = RecordBuilder::new("B001", allocator.allocate("B001"), issued)
        .buyer(Buyer::dni("45871236", "María Quispe"))
        .line("Cuaderno A4 cuadriculado", dec!(2), dec!(5.90))
        .line("Lapicero tinta azul", dec!(5), dec!(1.50))
        .build()
        .expect("record should be valid");

    let name = DocumentName::for_record("20601234561", &boleta);
    println!("Document: {}", name);
    println!("Type:     {} (catálogo 01)", boleta.type_code().code());
    println!("Buyer:    {}", boleta.buyer.name);
    println!("---");
    for line in &boleta.lines {
        println!(
            "  {} x {} @ {} = {}",
            line.quantity, line.description, line.unit_price, line.subtotal
        );
    }
    println!("---");
    println!("Base:     {} {}", net_of_igv(boleta.total), boleta.currency_code);
    println!("IGV 18%:  {} {}", igv_portion(boleta.total), boleta.currency_code);
    println!("Total:    {} {}", boleta.total, boleta.currency_code);

    // Correcting the sale later: a credit note for one returned item.
    let note = RecordBuilder::new("BC01", "00000007", issued)
        .buyer(Buyer::dni("45871236", "María Quispe"))
        .line("Cuaderno A4 cuadriculado", dec!(1), dec!(5.90))
        .credit_note(CreditNoteRef::new(
            &boleta.series,
            &boleta.number,
            CreditNoteReason::ItemReturn,
            "Devolución de un cuaderno",
        ))
        .build()
        .expect("credit note should be valid");

    println!();
    println!(
        "Credit note {} -> {}-{} (reason {})",
        DocumentName::for_record("20601234561", &note),
        boleta.series,
        boleta.number,
        note.credit_note_ref.as_ref().unwrap().reason_code
    );

    // Records serialize as-is; this is the shape a store persists.
    let json = serde_json::to_string_pretty(&boleta).expect("record serializes");
    println!();
    println!("Stored form ({} bytes):", json.len());
    println!("{}", &json[..400.min(json.len())]);
    println!("...");
}
