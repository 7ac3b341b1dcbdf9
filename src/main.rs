fn main() {
    let opts = match parse_flags() {
        Flags::Run(opts) => opts,
        Flags::Handled => return,
        Flags::Invalid(message) => {
            eprintln!("{message}");
            std::process::exit(2);
        }
    };

    if let Err(err) = newsdeck::run(opts) {
        eprintln!("error: {err:?}");
        std::process::exit(1);
    }
}

enum Flags {
    Run(newsdeck::RunOptions),
    Handled,
    Invalid(String),
}

fn parse_flags() -> Flags {
    let mut opts = newsdeck::RunOptions::default();
    let mut args = std::env::args().skip(1);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("Newsdeck {}", newsdeck::VERSION);
                return Flags::Handled;
            }
            "--help" | "-h" => {
                println!(
                    "Newsdeck - Sort, filter, and share a daily news digest from the terminal.\n\n  --digest <path|url>  Load the digest from this source\n  --view <fragment>    Start from a view link, e.g. '#sort=score&order=desc&filter=10'\n  --version, -V        Show version and exit\n  --help,    -h        Show this help message"
                );
                return Flags::Handled;
            }
            "--digest" => match args.next() {
                Some(value) => opts.digest_source = Some(value),
                None => return Flags::Invalid("--digest requires a path or URL".to_string()),
            },
            "--view" => match args.next() {
                Some(value) => opts.view_fragment = Some(value),
                None => return Flags::Invalid("--view requires a fragment string".to_string()),
            },
            other => {
                return Flags::Invalid(format!("unknown argument: {other} (try --help)"));
            }
        }
    }

    Flags::Run(opts)
}
