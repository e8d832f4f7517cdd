//! rsvand - split files into Reed-Solomon fragments and rebuild them
//!
//! Fragments are written as `<name>.<index>.frag`; indices `0..k` hold data
//! and `k..k+m` hold parity.

use anyhow::{bail, ensure, Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use log::{info, warn, LevelFilter};
use rsvand::fragment_file::{fragment_path, Fragment, FRAGMENT_EXTENSION};
use rsvand::{CodecConfig, ProviderKind, ReedSolomonVand};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

fn main() -> Result<()> {
    let matches = build_cli().get_matches();

    let mut logger = env_logger::Builder::from_default_env();
    logger
        .format_timestamp(None)
        .format_module_path(false)
        .format_target(false);
    if std::env::var_os("RUST_LOG").is_none() {
        logger.filter_level(verbosity(&matches));
    }
    logger.init();

    let quiet = matches.get_flag("quiet");
    match matches.subcommand() {
        Some(("encode", sub)) => handle_encode(sub, quiet),
        Some(("decode", sub)) => handle_decode(sub, quiet),
        Some(("reconstruct", sub)) => handle_reconstruct(sub, quiet),
        Some(("needed", sub)) => handle_needed(sub),
        _ => bail!("No command specified, see 'rsvand --help'"),
    }
}

fn build_cli() -> Command {
    Command::new("rsvand")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Reed-Solomon erasure coding over GF(2^8) with a Vandermonde generator")
        .arg_required_else_help(true)
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Increase log verbosity (repeat for more)")
                .action(ArgAction::Count)
                .global(true),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .help("Quiet mode - errors only")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand(provider_args(
            Command::new("encode")
                .visible_alias("e")
                .about("Split a file into k data and m parity fragments")
                .arg(
                    Arg::new("file")
                        .help("File to encode")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .index(1),
                )
                .arg(count_arg("k", 'k', "Number of data fragments"))
                .arg(count_arg("m", 'm', "Number of parity fragments"))
                .arg(output_arg("Directory for fragment files (default: next to the input)")),
        ))
        .subcommand(provider_args(
            Command::new("decode")
                .visible_alias("d")
                .about("Rebuild the original file from surviving fragments")
                .arg(fragments_arg())
                .arg(output_arg("Output file (default: original name next to the fragments)")),
        ))
        .subcommand(provider_args(
            Command::new("reconstruct")
                .visible_alias("r")
                .about("Rebuild a single fragment file")
                .arg(fragments_arg())
                .arg(
                    Arg::new("index")
                        .short('i')
                        .long("index")
                        .help("Fragment index to rebuild")
                        .value_name("INDEX")
                        .required(true)
                        .value_parser(value_parser!(usize)),
                )
                .arg(output_arg("Directory for the rebuilt fragment (default: next to the inputs)")),
        ))
        .subcommand(
            Command::new("needed")
                .about("Print the smallest set of fragments needed to decode")
                .arg(count_arg("k", 'k', "Number of data fragments"))
                .arg(count_arg("m", 'm', "Number of parity fragments"))
                .arg(index_list_arg("missing", "Missing fragment indices"))
                .arg(index_list_arg("exclude", "Fragment indices to avoid")),
        )
}

fn count_arg(name: &'static str, short: char, help: &'static str) -> Arg {
    Arg::new(name)
        .short(short)
        .help(help)
        .value_name("COUNT")
        .required(true)
        .value_parser(value_parser!(usize))
}

fn output_arg(help: &'static str) -> Arg {
    Arg::new("output")
        .short('o')
        .long("output")
        .help(help)
        .value_name("PATH")
        .value_parser(value_parser!(PathBuf))
}

fn fragments_arg() -> Arg {
    Arg::new("fragments")
        .help("Fragment files")
        .required(true)
        .num_args(1..)
        .value_parser(value_parser!(PathBuf))
        .index(1)
}

fn index_list_arg(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name)
        .long(name)
        .help(help)
        .value_name("LIST")
        .value_delimiter(',')
        .num_args(1..)
        .value_parser(value_parser!(usize))
}

fn provider_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("provider")
                .long("provider")
                .help("Field arithmetic provider")
                .value_parser(["native", "isal"])
                .default_value("native"),
        )
        .arg(
            Arg::new("isal_lib")
                .long("isal-lib")
                .help("Path to the ISA-L shared library (implies --provider isal)")
                .value_name("PATH")
                .value_parser(value_parser!(PathBuf)),
        )
}

fn verbosity(matches: &ArgMatches) -> LevelFilter {
    if matches.get_flag("quiet") {
        return LevelFilter::Error;
    }
    match matches.get_count("verbose") {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

fn provider_kind(matches: &ArgMatches) -> ProviderKind {
    if let Some(path) = matches.get_one::<PathBuf>("isal_lib") {
        return ProviderKind::Isal(Some(path.clone()));
    }
    match matches.get_one::<String>("provider").map(String::as_str) {
        Some("isal") => ProviderKind::Isal(None),
        _ => ProviderKind::Native,
    }
}

fn indices(matches: &ArgMatches, name: &str) -> Vec<usize> {
    matches
        .get_many::<usize>(name)
        .map(|values| values.copied().collect())
        .unwrap_or_default()
}

fn handle_encode(matches: &ArgMatches, quiet: bool) -> Result<()> {
    let file = matches
        .get_one::<PathBuf>("file")
        .context("file is required")?;
    let k = *matches.get_one::<usize>("k").context("-k is required")?;
    let m = *matches.get_one::<usize>("m").context("-m is required")?;

    let codec = CodecConfig::new(k, m)
        .with_provider(provider_kind(matches))
        .build()
        .context("Failed to create encoder")?;

    let contents =
        std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let stem = file
        .file_name()
        .and_then(|name| name.to_str())
        .with_context(|| format!("Cannot derive fragment names from {}", file.display()))?
        .to_string();
    let out_dir = match matches.get_one::<PathBuf>("output") {
        Some(dir) => dir.clone(),
        None => parent_dir(file),
    };
    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;

    let block_size = contents.len().div_ceil(k).max(1);
    let mut data = vec![vec![0u8; block_size]; k];
    for (block, chunk) in data.iter_mut().zip(contents.chunks(block_size)) {
        block[..chunk.len()].copy_from_slice(chunk);
    }
    let mut parity = vec![vec![0u8; block_size]; m];

    {
        let inputs: Vec<&[u8]> = data.iter().map(|d| d.as_slice()).collect();
        let mut outputs: Vec<&mut [u8]> = parity.iter_mut().map(|p| p.as_mut_slice()).collect();
        codec.encode(&inputs, &mut outputs, block_size)?;
    }

    let object_size = contents.len() as u64;
    for (index, payload) in data.into_iter().chain(parity).enumerate() {
        let path = fragment_path(&out_dir, &stem, index);
        Fragment::new(index, k, m, object_size, payload)?
            .write_file(&path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Wrote {}", path.display());
    }

    if !quiet {
        println!(
            "Encoded {} into {} data + {} parity fragments of {} bytes ({} provider)",
            file.display(),
            k,
            m,
            block_size,
            codec.provider_name()
        );
    }
    Ok(())
}

/// Fragments loaded from disk, keyed by index
struct FragmentGroup {
    stem: String,
    dir: PathBuf,
    k: usize,
    m: usize,
    block_size: usize,
    object_size: u64,
    fragments: BTreeMap<usize, Vec<u8>>,
}

impl FragmentGroup {
    /// Load every readable fragment; corrupted ones are skipped as missing
    fn load(paths: &[PathBuf]) -> Result<Self> {
        let mut header = None;
        let mut fragments = BTreeMap::new();

        for path in paths {
            let fragment = match Fragment::read_file(path) {
                Ok(fragment) => fragment,
                Err(e) => {
                    warn!("Skipping {}: {}", path.display(), e);
                    continue;
                }
            };
            let reference = *header.get_or_insert(fragment.header);
            ensure!(
                reference.same_object(&fragment.header),
                "{} belongs to a different object",
                path.display()
            );
            let index = fragment.index();
            ensure!(
                index < reference.k as usize + reference.m as usize,
                "{} has out of range index {}",
                path.display(),
                index
            );
            match fragments.entry(index) {
                Entry::Vacant(slot) => {
                    slot.insert(fragment.payload);
                }
                // The first copy wins; a disagreeing copy means the set is unusable
                Entry::Occupied(existing) => {
                    ensure!(
                        *existing.get() == fragment.payload,
                        "{} conflicts with an earlier copy of fragment {}",
                        path.display(),
                        index
                    );
                    warn!("Duplicate fragment {} in {}", index, path.display());
                }
            }
        }

        let header = header.context("No readable fragments")?;
        let first = paths.first().context("No fragment files given")?;
        let stem = fragment_stem(first)
            .with_context(|| format!("Cannot derive object name from {}", first.display()))?;

        Ok(Self {
            stem,
            dir: parent_dir(first),
            k: header.k as usize,
            m: header.m as usize,
            block_size: header.block_size(),
            object_size: header.object_size,
            fragments,
        })
    }

    fn missing(&self) -> Vec<usize> {
        (0..self.k + self.m)
            .filter(|i| !self.fragments.contains_key(i))
            .collect()
    }

    /// Fragment buffers in index order, zero-filled where missing
    fn buffers(&self) -> (Vec<Vec<u8>>, Vec<Vec<u8>>) {
        let mut all: Vec<Vec<u8>> = (0..self.k + self.m)
            .map(|i| {
                self.fragments
                    .get(&i)
                    .cloned()
                    .unwrap_or_else(|| vec![0u8; self.block_size])
            })
            .collect();
        let parity = all.split_off(self.k);
        (all, parity)
    }

    fn codec(&self, matches: &ArgMatches) -> Result<ReedSolomonVand> {
        CodecConfig::new(self.k, self.m)
            .with_provider(provider_kind(matches))
            .build()
            .context("Failed to create decoder")
    }
}

fn fragment_paths(matches: &ArgMatches) -> Vec<PathBuf> {
    matches
        .get_many::<PathBuf>("fragments")
        .map(|values| values.cloned().collect())
        .unwrap_or_default()
}

fn handle_decode(matches: &ArgMatches, quiet: bool) -> Result<()> {
    let group = FragmentGroup::load(&fragment_paths(matches))?;
    let codec = group.codec(matches)?;
    let missing = group.missing();

    let (mut data, mut parity) = group.buffers();
    {
        let mut d: Vec<&mut [u8]> = data.iter_mut().map(|b| b.as_mut_slice()).collect();
        let mut p: Vec<&mut [u8]> = parity.iter_mut().map(|b| b.as_mut_slice()).collect();
        codec
            .decode(&mut d, &mut p, &missing, group.block_size)
            .context("Decode failed")?;
    }

    let output = match matches.get_one::<PathBuf>("output") {
        Some(path) => path.clone(),
        None => {
            let path = group.dir.join(&group.stem);
            ensure!(
                !path.exists(),
                "{} already exists, choose an output with -o",
                path.display()
            );
            path
        }
    };

    let mut contents: Vec<u8> = data.concat();
    let object_size = usize::try_from(group.object_size).context("Object too large")?;
    ensure!(
        object_size <= contents.len(),
        "Fragments hold {} bytes but the object is {} bytes",
        contents.len(),
        object_size
    );
    contents.truncate(object_size);
    std::fs::write(&output, &contents)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    if !quiet {
        println!(
            "Decoded {} ({} bytes, {} fragments rebuilt)",
            output.display(),
            object_size,
            missing.len()
        );
    }
    Ok(())
}

fn handle_reconstruct(matches: &ArgMatches, quiet: bool) -> Result<()> {
    let group = FragmentGroup::load(&fragment_paths(matches))?;
    let codec = group.codec(matches)?;
    let target = *matches.get_one::<usize>("index").context("--index is required")?;
    let missing = group.missing();
    ensure!(
        missing.contains(&target),
        "Fragment {} is already present",
        target
    );

    let (mut data, mut parity) = group.buffers();
    {
        let mut d: Vec<&mut [u8]> = data.iter_mut().map(|b| b.as_mut_slice()).collect();
        let mut p: Vec<&mut [u8]> = parity.iter_mut().map(|b| b.as_mut_slice()).collect();
        codec
            .reconstruct(&mut d, &mut p, &missing, target, group.block_size)
            .context("Reconstruct failed")?;
    }

    let payload = if target < group.k {
        std::mem::take(&mut data[target])
    } else {
        std::mem::take(&mut parity[target - group.k])
    };
    let out_dir = match matches.get_one::<PathBuf>("output") {
        Some(dir) => dir.clone(),
        None => group.dir.clone(),
    };
    let path = fragment_path(&out_dir, &group.stem, target);
    Fragment::new(target, group.k, group.m, group.object_size, payload)?
        .write_file(&path)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    if !quiet {
        println!("Rebuilt fragment {} as {}", target, path.display());
    }
    Ok(())
}

fn handle_needed(matches: &ArgMatches) -> Result<()> {
    let k = *matches.get_one::<usize>("k").context("-k is required")?;
    let m = *matches.get_one::<usize>("m").context("-m is required")?;
    let codec = ReedSolomonVand::new(k, m)?;

    let needed = codec.min_fragments_needed(&indices(matches, "missing"), &indices(matches, "exclude"))?;
    let list: Vec<String> = needed.iter().map(|i| i.to_string()).collect();
    println!("{}", list.join(","));
    Ok(())
}

/// `photo.jpg.3.frag` -> `photo.jpg`
fn fragment_stem(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    let rest = name.strip_suffix(FRAGMENT_EXTENSION)?.strip_suffix('.')?;
    let (stem, index) = rest.rsplit_once('.')?;
    index.parse::<usize>().ok()?;
    Some(stem.to_string())
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
