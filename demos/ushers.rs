use darts_aho_corasick::{Machine, MachineBuilder};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::DEBUG)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let machine = MachineBuilder::new()
        .payload("she", "pronoun")
        .payload("hers", "possessive")
        .build(["CAN", "AN", "A", "she", "he", "hers"])?;

    #[cfg(feature = "dot")]
    println!("{}", machine.dump().to_dot()?);

    print!("{}", machine.dump().failure_table());
    print!("{}", machine.dump().output_table());

    let text = "he and she CAN CAR an herb, ushers";
    for m in machine.search(text, false) {
        let word: String = m.word.iter().collect();
        println!("pos={}: {} {:?}", m.position, word, m.payload);
    }

    let mut cursor = machine.cursor();
    for (i, c) in "ushers".chars().enumerate() {
        let ended: Vec<String> = cursor.next(c).map(|r| r.pattern().iter().collect()).collect();
        if !ended.is_empty() {
            println!("i={}: {:?}", i, ended);
        }
    }

    let plain = Machine::build(["cat"])?;
    println!("exact 'category': {:?}", plain.exact_match("category").is_some());
    println!("search 'category': {:?}", plain.search("category", true));

    Ok(())
}
