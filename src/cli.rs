//! Command-line helpers shared by both binaries.

use std::ffi::OsString;

use clap::Command;

/// Rewrite single-dash long flags (`-port 4001`, `-streams=4`) into clap's
/// `--port` form so both spellings work.
///
/// Only names that `command` defines as long flags are rewritten. Short
/// flags, negative numbers, positionals, and anything after `--` pass
/// through untouched.
pub fn normalize_long_flags<I, T>(args: I, command: &Command) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let mut longs: Vec<&str> = command
        .get_arguments()
        .filter_map(|a| a.get_long())
        .collect();
    longs.extend(["help", "version"]);

    let mut out = Vec::new();
    let mut rest_positional = false;
    for (i, arg) in args.into_iter().enumerate() {
        let arg: OsString = arg.into();
        if i == 0 || rest_positional {
            out.push(arg);
            continue;
        }
        if arg.to_str() == Some("--") {
            rest_positional = true;
            out.push(arg);
            continue;
        }

        let rewritten = arg.to_str().and_then(|s| {
            let body = s.strip_prefix('-')?;
            if body.starts_with('-') {
                return None;
            }
            let name = body.split_once('=').map_or(body, |(name, _)| name);
            let known = name.len() > 1 && longs.iter().any(|long| *long == name);
            known.then(|| OsString::from(format!("-{s}")))
        });
        out.push(rewritten.unwrap_or(arg));
    }
    out
}
