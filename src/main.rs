// Copyright 2022 Google LLC

// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

#![forbid(unsafe_code)]

use std::{
    fs::File,
    io::{Read, Write},
    path::PathBuf,
    time::Duration,
};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use httpfile::{get_length, RemoteFile, Whence};
use reqwest::blocking::Client;

const LONG_ABOUT: &str = "httpfile treats a resource on an HTTP server as a file.
Reads are served with Range requests, writes are sent as PATCH requests
carrying a Content-Range header.";

/// Read, write and measure HTTP resources as if they were local files.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = LONG_ABOUT)]
struct HttpfileArgs {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    client_args: ClientArgs,

    #[command(flatten)]
    verbose: clap_verbosity_flag::Verbosity,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Prints the length of a resource
    Len {
        #[command(flatten)]
        uri_args: UriArgs,
    },

    /// Copies a resource, or part of it, to stdout
    Cat {
        #[command(flatten)]
        uri_args: UriArgs,

        #[command(flatten)]
        offset_args: OffsetArgs,

        /// Stop after this many bytes. By default, everything up to the
        /// end of the resource is copied.
        #[arg(long, value_name = "BYTES")]
        count: Option<u64>,
    },

    /// Writes a file into a resource at an offset
    Patch {
        #[command(flatten)]
        uri_args: UriArgs,

        #[command(flatten)]
        offset_args: OffsetArgs,

        /// File whose contents to send. Omit to read stdin.
        #[arg(value_name = "FILE")]
        input: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct ClientArgs {
    /// Abandon any single HTTP(S) request which takes longer than this.
    #[arg(long, global = true, value_name = "SECONDS")]
    timeout: Option<u64>,
}

#[derive(Args, Debug)]
struct UriArgs {
    /// URI of the resource
    #[arg(value_name = "URI")]
    uri: String,
}

#[derive(Args, Debug)]
struct OffsetArgs {
    /// Where to start, relative to --whence.
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    offset: i64,

    /// What --offset is measured from. Measuring from the end costs an
    /// extra request to learn the length of the resource.
    #[arg(long, value_enum, default_value_t = SeekOrigin::Start)]
    whence: SeekOrigin,
}

#[derive(ValueEnum, Clone, Copy, Debug, Eq, PartialEq)]
enum SeekOrigin {
    Start,
    Current,
    End,
}

impl From<SeekOrigin> for Whence {
    fn from(origin: SeekOrigin) -> Self {
        match origin {
            SeekOrigin::Start => Whence::Start,
            SeekOrigin::Current => Whence::Current,
            SeekOrigin::End => Whence::End,
        }
    }
}

fn main() -> Result<()> {
    let args = HttpfileArgs::parse();
    env_logger::Builder::new()
        .filter_level(args.verbose.log_level_filter())
        .init();
    let client = construct_client(&args.client_args)?;
    match args.command {
        Commands::Len { uri_args } => {
            match get_length(&client, &uri_args.uri)? {
                Some(len) => println!("{len}"),
                None => println!("unknown"),
            }
            Ok(())
        }
        Commands::Cat {
            uri_args,
            offset_args,
            count,
        } => cat(
            RemoteFile::new(client, uri_args.uri),
            &offset_args,
            count,
            &mut std::io::stdout().lock(),
        ),
        Commands::Patch {
            uri_args,
            offset_args,
            input,
        } => {
            let mut data = Vec::new();
            match input {
                Some(path) => File::open(&path)
                    .and_then(|mut f| f.read_to_end(&mut data))
                    .with_context(|| format!("Failed to read {}", path.display()))?,
                None => std::io::stdin()
                    .read_to_end(&mut data)
                    .with_context(|| "Failed to read stdin")?,
            };
            patch(RemoteFile::new(client, uri_args.uri), &offset_args, &data)
        }
    }
}

fn construct_client(client_args: &ClientArgs) -> Result<Client> {
    let mut builder = Client::builder();
    if let Some(timeout) = client_args.timeout {
        builder = builder.timeout(Duration::from_secs(timeout));
    }
    builder.build().with_context(|| "Failed to set up HTTP client")
}

/// Position `file` as `offset_args` asks.
fn seek_to(file: &mut RemoteFile<Client>, offset_args: &OffsetArgs) -> Result<()> {
    let whence = Whence::from(offset_args.whence);
    if whence == Whence::End && file.length().is_none() {
        // The length is only known once a response has told us, so open a
        // reader at the start before seeking from the end.
        file.read(&mut [])?;
    }
    file.seek(offset_args.offset, whence)?;
    Ok(())
}

fn cat(
    mut file: RemoteFile<Client>,
    offset_args: &OffsetArgs,
    count: Option<u64>,
    out: &mut impl Write,
) -> Result<()> {
    seek_to(&mut file, offset_args)?;
    let copied = match count {
        Some(count) => std::io::copy(&mut Read::take(&mut file, count), out),
        None => std::io::copy(&mut file, out),
    }
    .with_context(|| "Failed to copy resource")?;
    log::info!("Copied {} bytes", copied);
    file.close()?;
    Ok(())
}

fn patch(mut file: RemoteFile<Client>, offset_args: &OffsetArgs, data: &[u8]) -> Result<()> {
    seek_to(&mut file, offset_args)?;
    let written = file.write(data)?;
    log::info!(
        "Wrote {} bytes at offset {}",
        written,
        file.position() - written as i64
    );
    file.close()?;
    Ok(())
}
