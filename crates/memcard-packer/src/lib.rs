use chrono::{DateTime, Local, NaiveDateTime};
use colored::Colorize;
use memcard::date_format;
use memcard::formats::dreamcast::{individual, Dreamcast, DreamcastMeta};
use memcard::formats::gamecube::{gci, GameCube, GameCubeMeta};
use memcard::formats::n64::{N64Meta, N64};
use memcard::formats::ps1::{sony, Ps1, Ps1Meta};
use memcard::formats::saturn::{bup, Saturn, SaturnMedia, SaturnMeta};
use memcard::text::TextEncoding;
use memcard::{CorruptFilePolicy, Format, FormatKind, SaveFile, Volume, Warning};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

pub mod container;

pub use container::{open_image, seal_image, ImageContainer, OpenedImage};

pub const CONFIG_FILE_NAME: &str = "card.toml";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub format: FormatKind,
    pub corrupt_files: Option<CorruptFilePolicy>,
    /// GameCube card size. Other formats have a single size.
    pub size_megabits: Option<u16>,
    /// Saturn backup memory, internal when omitted.
    pub saturn_media: Option<SaturnMedia>,
    /// What the image is stored in, raw when omitted.
    pub container: Option<ImageContainer>,
    pub header: toml::Table,
    pub files: Vec<FileConfig>,
}

/// One save: the payload file inside the packed folder and its directory metadata.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FileConfig {
    pub path: String,
    /// DexDrive comment kept next to the save.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dexdrive_comment: Option<String>,
    #[serde(flatten)]
    pub meta: toml::Table,
}

impl FileConfig {
    pub fn new(path: impl Into<String>, meta: toml::Table) -> Self {
        Self {
            path: path.into(),
            dexdrive_comment: None,
            meta,
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
struct ConfigFile {
    card: CardSection,
    #[serde(default, skip_serializing_if = "toml::Table::is_empty")]
    header: toml::Table,
    #[serde(default, rename = "file", skip_serializing_if = "Vec::is_empty")]
    files: Vec<FileConfig>,
}

#[derive(Debug, Deserialize, Serialize)]
struct CardSection {
    format: FormatKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    corrupt_files: Option<CorruptFilePolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    size_megabits: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    saturn_media: Option<SaturnMedia>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    container: Option<ImageContainer>,
}

impl From<ConfigFile> for Config {
    fn from(file: ConfigFile) -> Self {
        let ConfigFile {
            card,
            header,
            files,
        } = file;
        Self {
            format: card.format,
            corrupt_files: card.corrupt_files,
            size_megabits: card.size_megabits,
            saturn_media: card.saturn_media,
            container: card.container,
            header,
            files,
        }
    }
}

impl Config {
    pub fn new(format: FormatKind) -> Self {
        Self {
            format,
            corrupt_files: None,
            size_megabits: None,
            saturn_media: None,
            container: None,
            header: toml::Table::new(),
            files: Vec::new(),
        }
    }

    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        let config_file = ConfigFile {
            card: CardSection {
                format: self.format,
                corrupt_files: self.corrupt_files,
                size_megabits: self.size_megabits,
                saturn_media: self.saturn_media,
                container: self.container,
            },
            header: self.header.clone(),
            files: self.files.clone(),
        };

        toml::to_string_pretty(&config_file)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FileTimes {
    pub created: Option<SystemTime>,
    pub modified: SystemTime,
}

/// Source of payload file timestamps, used for metadata the configuration leaves out.
pub trait MetadataReader {
    fn file_times(&self, path: &Path) -> std::io::Result<FileTimes>;
}

#[derive(Default)]
pub struct FsMetadataReader;

impl MetadataReader for FsMetadataReader {
    fn file_times(&self, path: &Path) -> std::io::Result<FileTimes> {
        let metadata = std::fs::metadata(path)?;
        let modified = metadata.modified()?;
        let created = metadata.created().ok();
        Ok(FileTimes { created, modified })
    }
}

pub fn load_config(folder: &Path) -> Result<Config, Error> {
    let config_file = folder.join(CONFIG_FILE_NAME);
    let str = std::fs::read_to_string(&config_file)?;
    let config_file =
        toml::from_str::<ConfigFile>(&str).map_err(|e| Error::ConfigError(e.to_string()))?;
    Ok(config_file.into())
}

pub fn pack_card(folder: &Path, output: &Path) -> Result<(), Error> {
    let config = load_config(folder)?;
    pack_with_config(folder, output, config)
}

pub fn pack_with_config(folder: &Path, output: &Path, cfg: Config) -> Result<(), Error> {
    let metadata_reader = FsMetadataReader::default();
    pack_with_config_and_metadata_reader(folder, output, cfg, &metadata_reader)
}

pub fn pack_with_config_and_metadata_reader<M: MetadataReader>(
    folder: &Path,
    output: &Path,
    cfg: Config,
    metadata_reader: &M,
) -> Result<(), Error> {
    let container = cfg.container.unwrap_or_default();
    if !container.supports(cfg.format) {
        return Err(Error::ConfigError(format!(
            "a {container} container cannot hold a {} card",
            cfg.format
        )));
    }
    let built = match cfg.format {
        FormatKind::GameCube => {
            let card = match cfg.size_megabits {
                Some(megabits) => GameCube::new(megabits)?,
                None => GameCube::default(),
            };
            build_image(card, folder, &cfg, metadata_reader, import_gci)?
        }
        FormatKind::Dreamcast => build_image(
            Dreamcast::default(),
            folder,
            &cfg,
            metadata_reader,
            import_dreamcast,
        )?,
        FormatKind::N64 => build_image(N64::default(), folder, &cfg, metadata_reader, no_import)?,
        FormatKind::Ps1 => build_image(Ps1::default(), folder, &cfg, metadata_reader, import_psv)?,
        FormatKind::Saturn => {
            let media = cfg.saturn_media.unwrap_or(SaturnMedia::Internal);
            build_image(Saturn::new(media), folder, &cfg, metadata_reader, import_bup)?
        }
    };
    let image = seal_image(cfg.format, container, built.image, &built.comments)?;
    std::fs::write(output, image)?;
    Ok(())
}

/// A built image and the DexDrive comments of its saves, by directory slot.
struct Built {
    image: Vec<u8>,
    comments: Vec<String>,
}

fn extension(path: &Path) -> Option<String> {
    Some(path.extension()?.to_str()?.to_ascii_lowercase())
}

/// A payload file that already carries its own metadata in a container.
type Import<T> = fn(&Path, &[u8]) -> Option<Result<SaveFile<T>, Error>>;

fn no_import<T>(_path: &Path, _bytes: &[u8]) -> Option<Result<SaveFile<T>, Error>> {
    None
}

fn import_gci(path: &Path, bytes: &[u8]) -> Option<Result<SaveFile<GameCubeMeta>, Error>> {
    if !matches!(extension(path)?.as_str(), "gci" | "gcs" | "sav") {
        return None;
    }
    Some(
        gci::read_individual_save(bytes)
            .map(|save| save.file)
            .map_err(Error::from),
    )
}

/// `.dci` saves, or a `.vmi` description with its `.vms` payload beside it.
fn import_dreamcast(path: &Path, bytes: &[u8]) -> Option<Result<SaveFile<DreamcastMeta>, Error>> {
    match extension(path)?.as_str() {
        "dci" => Some(individual::read_dci(bytes).map_err(Error::from)),
        "vmi" => Some(read_vmi_pair(path, bytes)),
        _ => None,
    }
}

fn read_vmi_pair(vmi_path: &Path, vmi: &[u8]) -> Result<SaveFile<DreamcastMeta>, Error> {
    let vms = std::fs::read(vmi_path.with_extension("vms"))?;
    let (file, _) = individual::read_vmi_vms(vmi, &vms)?;
    Ok(file)
}

fn import_psv(path: &Path, bytes: &[u8]) -> Option<Result<SaveFile<Ps1Meta>, Error>> {
    if extension(path)? != "psv" {
        return None;
    }
    Some(sony::read_psv(bytes).map_err(Error::from))
}

fn import_bup(path: &Path, bytes: &[u8]) -> Option<Result<SaveFile<SaturnMeta>, Error>> {
    if extension(path)? != "bup" {
        return None;
    }
    Some(bup::read_bup(bytes).map_err(Error::from))
}

fn build_image<F: Format, M: MetadataReader>(
    format: F,
    folder: &Path,
    cfg: &Config,
    metadata_reader: &M,
    import: Import<F::Meta>,
) -> Result<Built, Error> {
    let header = if cfg.header.is_empty() {
        F::Header::default()
    } else {
        toml::Value::Table(cfg.header.clone())
            .try_into::<F::Header>()
            .map_err(|e| Error::ConfigError(format!("[header]: {e}")))?
    };

    let mut files = Vec::with_capacity(cfg.files.len());
    for file in &cfg.files {
        let path = payload_path(folder, &file.path)?;
        let payload = std::fs::read(&path)?;

        if file.meta.is_empty() {
            if let Some(imported) = import(&path, &payload) {
                let imported = imported?;
                println!("{}", progress_line("Importing", &file.path));
                files.push(imported);
                continue;
            }
        }

        let mut meta = file.meta.clone();
        fill_timestamp(cfg.format, &path, &mut meta, metadata_reader)?;
        let meta = toml::Value::Table(meta)
            .try_into::<F::Meta>()
            .map_err(|e| Error::ConfigError(format!("{}: {e}", file.path)))?;

        println!("{}", progress_line("Adding", &file.path));
        files.push(SaveFile::new(meta, payload));
    }

    let format = match cfg.corrupt_files {
        Some(policy) => format.with_corrupt_file_policy(policy),
        None => format,
    };
    let volume = Volume::build(format, header, files)?;
    println!(
        "{} {} {}",
        "Packed".dimmed(),
        volume.files().len(),
        format!(
            "files, {} of {} blocks free",
            volume.free_blocks(),
            volume.layout().data_area.count
        )
        .dimmed()
    );

    let mut comments = Vec::new();
    for (&slot, file) in volume.slots().iter().zip(&cfg.files) {
        if let Some(comment) = &file.dexdrive_comment {
            if comments.len() <= slot {
                comments.resize(slot + 1, String::new());
            }
            comments[slot] = comment.clone();
        }
    }
    Ok(Built {
        image: volume.into_image(),
        comments,
    })
}

/// `+ Verb name`, with only the verb coloured.
fn progress_line(verb: &str, name: &str) -> String {
    format!("+ {} {}", verb.green(), name)
}

fn payload_path(folder: &Path, name: &str) -> Result<PathBuf, Error> {
    if name.is_empty()
        || name.contains(|c| matches!(c, '\\' | '/'))
        || name == "."
        || name == ".."
        || name.eq_ignore_ascii_case(CONFIG_FILE_NAME)
    {
        return Err(Error::NameError(name.to_owned()));
    }
    Ok(folder.join(name))
}

/// Fills the format's timestamp field from the payload file when the configuration omits it.
fn fill_timestamp<M: MetadataReader>(
    format: FormatKind,
    path: &Path,
    meta: &mut toml::Table,
    metadata_reader: &M,
) -> Result<(), Error> {
    let key = match format {
        FormatKind::GameCube => "modified",
        FormatKind::Dreamcast => "created",
        FormatKind::Saturn => "saved",
        FormatKind::N64 | FormatKind::Ps1 => return Ok(()),
    };
    if meta.contains_key(key) {
        return Ok(());
    }
    let file_times = metadata_reader.file_times(path)?;
    let time = match format {
        FormatKind::Dreamcast => file_times.created.unwrap_or(file_times.modified),
        _ => file_times.modified,
    };
    let stamp = convert_timestamp(time)?.format(date_format::FORMAT).to_string();
    meta.insert(key.to_owned(), toml::Value::String(stamp));
    Ok(())
}

fn convert_timestamp(time: SystemTime) -> Result<NaiveDateTime, Error> {
    let duration = time
        .duration_since(UNIX_EPOCH)
        .map_err(|e| Error::ConfigError(e.to_string()))?;
    DateTime::from_timestamp(duration.as_secs() as i64, 0)
        .map(|time| time.with_timezone(&Local).naive_local())
        .ok_or_else(|| Error::ConfigError("file timestamp out of range".to_owned()))
}

/// How an image is opened for unpacking or listing.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenOptions {
    /// Skip detection and read the image as this format.
    pub format: Option<FormatKind>,
    pub corrupt_files: Option<CorruptFilePolicy>,
}

fn open<F: Format>(format: F, options: &OpenOptions, image: &[u8]) -> Result<Volume<F>, Error> {
    let format = match options.corrupt_files {
        Some(policy) => format.with_corrupt_file_policy(policy),
        None => format,
    };
    let volume = Volume::parse(format, image)?;
    for skipped in volume.skipped() {
        eprintln!(
            "{} {} {}",
            "Slot".dimmed(),
            skipped.slot.to_string().dimmed(),
            format!("is corrupted, skipping: {}", skipped.error).dimmed()
        );
    }
    Ok(volume)
}

/// Extracts every save of the image at `image_path` into `folder` and writes a `card.toml` that
/// packs back into the same saves.
///
/// With `individual` set, saves are written in their console's single-save container (GCI,
/// DCI or BUP) instead of as raw payloads. PS1 and N64 saves have none and stay raw.
pub fn unpack_card(
    image_path: &Path,
    folder: &Path,
    options: OpenOptions,
    individual: bool,
) -> Result<Config, Error> {
    let bytes = std::fs::read(image_path)?;
    let opened = open_image(&bytes, options.format)?;
    let (kind, image, comments) = (opened.kind, &opened.image, &opened.comments);
    std::fs::create_dir_all(folder)?;

    let config = match kind {
        FormatKind::GameCube => {
            let card = GameCube::for_image(image)?;
            let megabits = card.megabits();
            let volume = open(card, &options, image)?;
            let export: Export<GameCubeMeta> = if individual { export_gci } else { no_export };
            let mut config = unpack_volume(&volume, kind, folder, comments, export)?;
            config.size_megabits = Some(megabits);
            config
        }
        FormatKind::Dreamcast => {
            let volume = open(Dreamcast::default(), &options, image)?;
            let export: Export<DreamcastMeta> = if individual { export_dci } else { no_export };
            unpack_volume(&volume, kind, folder, comments, export)?
        }
        FormatKind::N64 => {
            let volume = open(N64::default(), &options, image)?;
            unpack_volume(&volume, kind, folder, comments, no_export)?
        }
        FormatKind::Ps1 => {
            let volume = open(Ps1::default(), &options, image)?;
            unpack_volume(&volume, kind, folder, comments, no_export)?
        }
        FormatKind::Saturn => {
            let saturn = Saturn::for_image(image)?;
            let media = saturn.media().ok_or_else(|| {
                Error::ConfigError(
                    "saturn image has a non-standard geometry and cannot be packed again".to_owned(),
                )
            })?;
            let volume = open(saturn, &options, image)?;
            let export: Export<SaturnMeta> = if individual { export_bup } else { no_export };
            let mut config = unpack_volume(&volume, kind, folder, comments, export)?;
            config.saturn_media = Some(media);
            config
        }
    };
    let config = Config {
        corrupt_files: options.corrupt_files,
        container: (opened.container != ImageContainer::Raw).then_some(opened.container),
        ..config
    };

    let toml = config
        .to_toml_string()
        .map_err(|e| Error::ConfigError(e.to_string()))?;
    std::fs::write(folder.join(CONFIG_FILE_NAME), toml)?;
    Ok(config)
}

/// A save written in a self-describing container, as (file extension, bytes).
type Export<T> = fn(&SaveFile<T>) -> Option<Result<(&'static str, Vec<u8>), Error>>;

fn no_export<T>(_file: &SaveFile<T>) -> Option<Result<(&'static str, Vec<u8>), Error>> {
    None
}

fn export_gci(file: &SaveFile<GameCubeMeta>) -> Option<Result<(&'static str, Vec<u8>), Error>> {
    Some(gci::write_gci(file).map(|bytes| ("gci", bytes)).map_err(Error::from))
}

fn export_dci(file: &SaveFile<DreamcastMeta>) -> Option<Result<(&'static str, Vec<u8>), Error>> {
    Some(individual::write_dci(file).map(|bytes| ("dci", bytes)).map_err(Error::from))
}

fn export_bup(file: &SaveFile<SaturnMeta>) -> Option<Result<(&'static str, Vec<u8>), Error>> {
    Some(bup::write_bup(file, 0).map(|bytes| ("bup", bytes)).map_err(Error::from))
}

fn unpack_volume<F: Format>(
    volume: &Volume<F>,
    kind: FormatKind,
    folder: &Path,
    comments: &[String],
    export: Export<F::Meta>,
) -> Result<Config, Error> {
    let mut config = Config::new(kind);
    let header = toml::Value::try_from(volume.header()).map_err(|e| Error::ConfigError(e.to_string()))?;
    if let toml::Value::Table(header) = header {
        config.header = header;
    }

    let mut used_names = HashSet::new();
    for (file, &slot) in volume.files().iter().zip(volume.slots()) {
        let display_name = volume.format().display_name(&file.meta);
        let (extension, bytes, meta) = match export(file) {
            Some(exported) => {
                let (extension, bytes) = exported?;
                (extension, bytes, toml::Table::new())
            }
            None => {
                let meta = match toml::Value::try_from(&file.meta)
                    .map_err(|e| Error::ConfigError(e.to_string()))?
                {
                    toml::Value::Table(meta) => meta,
                    _ => toml::Table::new(),
                };
                ("bin", file.payload.clone(), meta)
            }
        };
        let name = unique_file_name(&display_name, extension, &mut used_names);

        println!("{}", progress_line("Extracting", &name));
        std::fs::write(folder.join(&name), bytes)?;
        let mut entry = FileConfig::new(name, meta);
        entry.dexdrive_comment = comments
            .get(slot)
            .filter(|comment| !comment.is_empty())
            .cloned();
        config.files.push(entry);
    }
    Ok(config)
}

fn unique_file_name(display_name: &str, extension: &str, used: &mut HashSet<String>) -> String {
    let mut base: String = display_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if base.trim_matches('.').is_empty() {
        base = "save".to_owned();
    }
    let mut name = format!("{base}.{extension}");
    let mut counter = 1;
    while !used.insert(name.to_ascii_lowercase()) || name.eq_ignore_ascii_case(CONFIG_FILE_NAME) {
        counter += 1;
        name = format!("{base}~{counter}.{extension}");
    }
    name
}

#[derive(Debug, Serialize)]
pub struct Listing {
    pub format: FormatKind,
    pub container: ImageContainer,
    pub block_size: usize,
    pub total_blocks: u16,
    pub used_blocks: u16,
    pub free_blocks: u16,
    pub files: Vec<ListedFile>,
    pub skipped: Vec<ListedSkip>,
    pub warnings: Vec<Warning>,
}

#[derive(Debug, Serialize)]
pub struct ListedFile {
    pub name: String,
    pub blocks: usize,
    pub bytes: usize,
    /// Derived fields such as region and comments.
    pub details: Vec<String>,
    pub meta: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct ListedSkip {
    pub slot: usize,
    pub error: String,
}

fn describe_nothing<T>(_file: &SaveFile<T>) -> Vec<String> {
    Vec::new()
}

fn describe_gamecube(
    file: &SaveFile<GameCubeMeta>,
    encoding: Option<TextEncoding>,
) -> Vec<String> {
    let mut details = vec![file.meta.region().to_owned()];
    details.extend(
        file.comments(encoding)
            .into_iter()
            .map(|comment| comment.text)
            .filter(|text| !text.is_empty()),
    );
    details
}

fn describe_ps1(file: &SaveFile<Ps1Meta>) -> Vec<String> {
    let mut details = vec![file.meta.region().to_owned()];
    details.extend(file.description().map(|description| description.text));
    details
}

fn describe_n64(file: &SaveFile<N64Meta>) -> Vec<String> {
    vec![file.meta.region().to_owned()]
}

fn describe_saturn(file: &SaveFile<SaturnMeta>) -> Vec<String> {
    let mut details = vec![file.meta.language.to_string()];
    if !file.meta.comment.is_empty() {
        details.push(file.meta.comment.clone());
    }
    details
}

pub fn list_card(image_path: &Path, options: OpenOptions) -> Result<Listing, Error> {
    let bytes = std::fs::read(image_path)?;
    let opened = open_image(&bytes, options.format)?;
    let image = &opened.image;
    match opened.kind {
        FormatKind::GameCube => {
            let volume = open(GameCube::for_image(image)?, &options, image)?;
            let encoding = volume.header().text_encoding();
            list_volume(&volume, &opened, |file| describe_gamecube(file, encoding))
        }
        FormatKind::Dreamcast => {
            let volume = open(Dreamcast::default(), &options, image)?;
            list_volume(&volume, &opened, describe_nothing)
        }
        FormatKind::N64 => {
            let volume = open(N64::default(), &options, image)?;
            list_volume(&volume, &opened, describe_n64)
        }
        FormatKind::Ps1 => {
            let volume = open(Ps1::default(), &options, image)?;
            list_volume(&volume, &opened, describe_ps1)
        }
        FormatKind::Saturn => {
            let volume = open(Saturn::for_image(image)?, &options, image)?;
            list_volume(&volume, &opened, describe_saturn)
        }
    }
}

fn list_volume<F: Format>(
    volume: &Volume<F>,
    opened: &OpenedImage,
    describe: impl Fn(&SaveFile<F::Meta>) -> Vec<String>,
) -> Result<Listing, Error> {
    let block_size = volume.block_size();
    let mut files = Vec::with_capacity(volume.files().len());
    for (file, &slot) in volume.files().iter().zip(volume.slots()) {
        let mut details = describe(file);
        if let Some(comment) = opened.comments.get(slot).filter(|comment| !comment.is_empty()) {
            details.push(format!("comment: {comment}"));
        }
        files.push(ListedFile {
            name: volume.format().display_name(&file.meta),
            blocks: file.payload.len().div_ceil(block_size),
            bytes: file.payload.len(),
            details,
            meta: serde_json::to_value(&file.meta)
                .map_err(|e| Error::ConfigError(e.to_string()))?,
        });
    }
    Ok(Listing {
        format: opened.kind,
        container: opened.container,
        block_size,
        total_blocks: volume.total_blocks(),
        used_blocks: volume.used_blocks(),
        free_blocks: volume.free_blocks(),
        files,
        skipped: volume
            .skipped()
            .iter()
            .map(|skipped| ListedSkip {
                slot: skipped.slot,
                error: skipped.error.to_string(),
            })
            .collect(),
        warnings: volume.warnings().to_vec(),
    })
}

pub fn print_listing(listing: &Listing) {
    println!(
        "{} {} {} {}",
        listing.format.to_string().bold(),
        format!("({})", listing.container).dimmed(),
        format!("{} blocks of {} bytes,", listing.total_blocks, listing.block_size).dimmed(),
        format!("{} used, {} free", listing.used_blocks, listing.free_blocks).dimmed()
    );
    for file in &listing.files {
        println!(
            "  {} {}",
            file.name.green(),
            format!("{} blocks, {} bytes", file.blocks, file.bytes).dimmed()
        );
        for detail in &file.details {
            println!("    {}", detail.dimmed());
        }
    }
    for skipped in &listing.skipped {
        println!("  {} {}", format!("slot {}", skipped.slot).red(), skipped.error.dimmed());
    }
    for warning in &listing.warnings {
        eprintln!("{} {}", "warning:".yellow(), warning);
    }
}

#[derive(Debug)]
pub enum Error {
    NameError(String),
    IOError(std::io::Error),
    ConfigError(String),
    CardError(memcard::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::NameError(name) => {
                write!(f, "`{name}` must name a file directly inside the card folder")
            }
            Error::IOError(err) => write!(f, "{err:?}"),
            Error::ConfigError(err) => write!(f, "{err}"),
            Error::CardError(err) => write!(f, "{err}"),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::IOError(err)
    }
}

impl From<memcard::Error> for Error {
    fn from(err: memcard::Error) -> Self {
        Error::CardError(err)
    }
}
