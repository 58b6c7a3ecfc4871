use setrunner_core::storage::Database;
use setrunner_core::validate;

use super::setup::SetupArgs;

/// Print the setup that `run` would use, or the reason it would be refused.
pub fn run(args: SetupArgs) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;
    let config = validate(&args.resolve(&db)?)?;
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}
