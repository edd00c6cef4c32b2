//! Thin binary entry point. Grounded on `av1an/src/main.rs`: install a
//! panic hook that terminates the process (so a panic in a pipeline
//! thread doesn't leave the batch hanging), then delegate everything else
//! to the CLI crate.

use std::panic;
use std::process;

fn main() -> anyhow::Result<()> {
    let orig_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        orig_hook(panic_info);
        process::exit(1);
    }));

    deinterlace_cli::run()
}
