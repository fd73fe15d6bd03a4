use std::error::Error;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use clap::Parser;
use fieldmask::{copy_filtered, filter_reader, FieldsExpression, JsonText, JsonWriter, SchemaRepository};
use tracing::{debug, Level};

/// Filters the JSON document on stdin down to the fields selected by an expression.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// The fields expression, e.g. "items(id,title)".
    #[arg(short, long)]
    fields: String,

    /// A discovery document to validate the expression against.
    #[arg(short, long, requires = "resource")]
    discovery: Option<PathBuf>,

    /// The schema of the discovery document describing the input.
    #[arg(short, long, requires = "discovery")]
    resource: Option<String>,

    /// Indent the output.
    #[arg(long)]
    pretty: bool,

    /// Log to stderr, repeat for more detail.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let level = match args.verbose {
        0 => Level::WARN,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .init();

    let expression = FieldsExpression::parse(&args.fields)?;

    if let Some(discovery) = &args.discovery {
        let resource = args
            .resource
            .as_deref()
            .ok_or("--resource is required with --discovery")?;
        let repository = SchemaRepository::from_discovery_json(&fs::read_to_string(discovery)?)?;
        let schema = repository.resource_tree(resource)?;
        if !expression.is_valid_against(&schema) {
            return Err(format!("fields expression '{expression}' does not match resource {resource}").into());
        }
        debug!(resource, "fields expression is valid");
    }

    let tree = expression.filter_tree();
    let stdin = io::stdin().lock();
    let mut stdout = CountingWriter::new(io::stdout().lock());
    if args.pretty {
        copy_filtered(JsonText::new(stdin), JsonWriter::pretty(&mut stdout), tree)?;
    } else {
        filter_reader(stdin, &mut stdout, tree)?;
    }
    if stdout.written > 0 {
        writeln!(stdout)?;
    }
    Ok(())
}

/// Tracks whether any output was produced.
struct CountingWriter<W> {
    inner: W,
    written: usize,
}

impl<W: Write> CountingWriter<W> {
    fn new(inner: W) -> Self {
        CountingWriter { inner, written: 0 }
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.inner.write(buf)?;
        self.written += written;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
