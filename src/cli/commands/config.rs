use anyhow::Result;
use clausecheck_config::Config;
use clausecheck_utils::canonicalization::emit_jcs;
use clausecheck_utils::exit_codes::ExitCode;
use serde_json::json;

/// Print the effective configuration with the source of each value.
pub fn execute_config_command(config: &Config, json: bool) -> Result<ExitCode> {
    let effective = config.effective_config();

    if json {
        let values: serde_json::Map<String, serde_json::Value> = effective
            .into_iter()
            .map(|(key, (value, source))| (key, json!({ "value": value, "source": source })))
            .collect();
        let output = json!({
            "config_path": config.config_path.as_ref().map(|p| p.display().to_string()),
            "values": values,
        });
        println!("{}", emit_jcs(&output)?);
        return Ok(ExitCode::SUCCESS);
    }

    match &config.config_path {
        Some(path) => println!("Config file: {}", path.display()),
        None => println!("Config file: (none, using defaults)"),
    }
    println!("\n  Effective configuration:");
    for (key, (value, source)) in effective {
        println!("    {key} = {value} (from {source})");
    }
    Ok(ExitCode::SUCCESS)
}
