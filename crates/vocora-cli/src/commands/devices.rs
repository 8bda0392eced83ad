//! Audio device listing.

use clap::{Args, Subcommand};
use vocora_io::{AudioDevice, default_device, list_devices};

#[derive(Args)]
pub struct DevicesArgs {
    #[command(subcommand)]
    command: Option<DevicesCommand>,
}

#[derive(Subcommand)]
enum DevicesCommand {
    /// List all available audio devices
    List,

    /// Show the default devices
    Info,
}

pub fn run(args: DevicesArgs) -> anyhow::Result<()> {
    match args.command.unwrap_or(DevicesCommand::List) {
        DevicesCommand::List => {
            let devices = list_devices()?;
            if devices.is_empty() {
                println!("No audio devices found.");
                return Ok(());
            }

            let inputs: Vec<_> = devices.iter().filter(|d| d.is_input).collect();
            let outputs: Vec<_> = devices.iter().filter(|d| d.is_output).collect();
            print_group("Input Devices:", &inputs);
            print_group("Output Devices:", &outputs);

            println!(
                "Total: {} input(s), {} output(s)",
                inputs.len(),
                outputs.len()
            );
            println!();
            println!("Tip: pass a device index or partial name to `vocora run`:");
            println!("  vocora run --input-device 0 --output-device \"USB\"");
        }

        DevicesCommand::Info => {
            let (input, output) = default_device()?;
            match input {
                Some(d) => println!("Default Input:  {} ({} Hz)", d.name, d.default_sample_rate),
                None => println!("Default Input:  None"),
            }
            match output {
                Some(d) => println!("Default Output: {} ({} Hz)", d.name, d.default_sample_rate),
                None => println!("Default Output: None"),
            }
        }
    }

    Ok(())
}

fn print_group(title: &str, devices: &[&AudioDevice]) {
    if devices.is_empty() {
        return;
    }
    println!("{title}");
    for (idx, device) in devices.iter().enumerate() {
        println!(
            "  [{}] {} ({} Hz)",
            idx, device.name, device.default_sample_rate
        );
    }
    println!();
}
