use crate::presets::PRESETS;
use serde::Serialize;

#[derive(Serialize)]
struct PresetJson {
    key: &'static str,
    label: &'static str,
    description: &'static str,
    default_on: bool,
    tables: Vec<&'static str>,
}

pub fn run(json: bool) -> anyhow::Result<()> {
    if json {
        let out: Vec<PresetJson> = PRESETS
            .iter()
            .map(|p| PresetJson {
                key: p.key,
                label: p.label,
                description: p.description,
                default_on: p.default_on,
                tables: p.tables.to_vec(),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    for preset in PRESETS {
        println!(
            "{}: {}{}",
            preset.key,
            preset.label,
            if preset.default_on { " (default)" } else { "" }
        );
        println!("  {}", preset.description);
        println!("  tables: {}", preset.tables.join(", "));
        println!();
    }
    Ok(())
}
