mod cmd;

use std::process;

use clap::error::ErrorKind as ArgsErrorKind;
use clap::Parser;
use cmd::App;

#[tokio::main]
async fn main() {
    let app = match App::try_parse() {
        Ok(app) => app,
        Err(err) => {
            err.use_stderr();
            _ = err.print();
            if matches!(
                err.kind(),
                ArgsErrorKind::DisplayHelp
                    | ArgsErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                    | ArgsErrorKind::DisplayVersion
            ) {
                return;
            }
            process::exit(3);
        }
    };

    if let Err(e) = app.run().await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
