use pitch_exec::context::Phase;
use serde::Serialize;

use crate::cmd::config::load_registry;
use crate::exit_codes;
use crate::output::{print_error, print_result, OutputFormat};
use crate::{OutputArgs, PluginManifestArgs};

#[derive(Serialize)]
struct PluginEntry {
    name: String,
    phase: Phase,
    signature: String,
    description: String,
}

pub async fn list_cmd(phase: Option<&str>, plugins: PluginManifestArgs, output: OutputArgs) -> i32 {
    let phases: Vec<Phase> = match phase {
        None => Phase::ALL.to_vec(),
        Some(raw) => match raw.parse::<Phase>() {
            Ok(p) => vec![p],
            Err(e) => {
                print_error(output.format, output.quiet, &e.to_string());
                return exit_codes::VALIDATION_FAILED;
            }
        },
    };
    let registry = match load_registry(&plugins) {
        Ok(r) => r,
        Err(e) => {
            print_error(output.format, output.quiet, &e.to_string());
            return exit_codes::VALIDATION_FAILED;
        }
    };

    let entries: Vec<PluginEntry> = phases
        .iter()
        .flat_map(|phase| registry.descriptors(*phase))
        .map(|d| PluginEntry {
            name: d.name.clone(),
            phase: d.phase,
            signature: d.signature(),
            description: d.description.clone(),
        })
        .collect();

    if output.format == OutputFormat::Text && !output.quiet {
        for phase in &phases {
            println!("{phase} plugins:");
            for entry in entries.iter().filter(|e| e.phase == *phase) {
                println!("  {:<48} {}", entry.signature, entry.description);
            }
        }
    } else {
        print_result(output.format, output.quiet, &entries);
    }
    exit_codes::SUCCESS
}
