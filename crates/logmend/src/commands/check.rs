//! Check command implementation - validates a log directory without opening the file

use anyhow::{bail, Result};
use logmend_core::StreamOptions;
use logmend_stream::factory;

use crate::cli::CheckArgs;
use crate::output::{print_error, print_success};

pub fn execute(args: CheckArgs) -> Result<()> {
    let path = StreamOptions::new(&args.file).absolute_path()?;

    match factory::prepare_directory(&path, !args.no_create_dir) {
        Ok(dir) => {
            print_success(&format!("{} is writable", dir.display()));
            Ok(())
        }
        Err(e) => {
            print_error(&e.to_string());
            bail!(e)
        }
    }
}
