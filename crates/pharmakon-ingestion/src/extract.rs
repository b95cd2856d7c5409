//! Streaming PubMed XML record extractor.
//!
//! Event-based parse over the `<PubmedArticleSet><PubmedArticle>` structure.
//! Only the current article's accumulated text is held in memory, so corpus
//! files far larger than RAM stream through. Articles missing a title or an
//! abstract are skipped and counted, never aborting the stream.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::{debug, info, warn};

use pharmakon_common::{PharmakonError, Result};

use crate::models::PubMedRecord;

/// Lazy, restartable-per-file stream of records out of one PubMed XML file.
pub struct RecordStream<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    source_file: String,
    skipped: usize,
    done: bool,
}

impl RecordStream<BufReader<File>> {
    /// Open an XML corpus file for streaming extraction.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|_| {
            PharmakonError::ResourceNotFound(format!("XML corpus file: {}", path.display()))
        })?;
        let source_file = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::from_reader(
            Reader::from_reader(BufReader::new(file)),
            source_file,
        ))
    }
}

impl<'a> RecordStream<&'a [u8]> {
    /// Parse from an in-memory XML string (tests, small corpora).
    pub fn from_xml(xml: &'a str, source_file: &str) -> Self {
        Self::from_reader(Reader::from_reader(xml.as_bytes()), source_file.to_string())
    }
}

impl<R: BufRead> RecordStream<R> {
    fn from_reader(mut reader: Reader<R>, source_file: String) -> Self {
        reader.config_mut().trim_text(true);
        Self {
            reader,
            buf: Vec::new(),
            source_file,
            skipped: 0,
            done: false,
        }
    }

    /// Articles dropped so far for missing title/abstract or local parse damage.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Pull the next complete article off the event stream.
    fn next_record(&mut self) -> Option<PubMedRecord> {
        // Per-article accumulation state
        let mut in_article = false;
        let mut in_pmid = false;
        let mut in_title = false;
        let mut in_abstract = false;
        let mut pmid: Option<String> = None;
        let mut title = String::new();
        let mut fragments: Vec<String> = Vec::new();

        loop {
            let mut emit: Option<PubMedRecord> = None;

            match self.reader.read_event_into(&mut self.buf) {
                Ok(Event::Start(ref e)) => match e.name().as_ref() {
                    b"PubmedArticle" => {
                        in_article = true;
                        pmid = None;
                        title.clear();
                        fragments.clear();
                    }
                    b"PMID" if in_article => in_pmid = true,
                    b"ArticleTitle" if in_article => in_title = true,
                    b"AbstractText" if in_article => in_abstract = true,
                    _ => {}
                },
                Ok(Event::Text(ref e)) if in_article => {
                    let text = e.unescape().unwrap_or_default().to_string();
                    if in_pmid && pmid.is_none() {
                        pmid = Some(text.trim().to_string());
                    } else if in_title {
                        // Titles may carry markup children; join the fragments.
                        if !title.is_empty() {
                            title.push(' ');
                        }
                        title.push_str(text.trim());
                    } else if in_abstract {
                        let t = text.trim().to_string();
                        if !t.is_empty() {
                            fragments.push(t);
                        }
                    }
                }
                Ok(Event::End(ref e)) => match e.name().as_ref() {
                    b"PMID" => in_pmid = false,
                    b"ArticleTitle" => in_title = false,
                    b"AbstractText" => in_abstract = false,
                    b"PubmedArticle" => {
                        in_article = false;
                        let full_title = title.trim().to_string();
                        let abstract_text = fragments.join(" ").trim().to_string();
                        if !full_title.is_empty() && !abstract_text.is_empty() {
                            emit = Some(PubMedRecord {
                                pmid: pmid.take().filter(|p| !p.is_empty()),
                                title: full_title,
                                abstract_text,
                                source_file: self.source_file.clone(),
                            });
                        } else {
                            // Partial article: drop it and keep streaming.
                            self.skipped += 1;
                            debug!(source = %self.source_file, "Skipped article without title/abstract");
                        }
                        pmid = None;
                        title.clear();
                        fragments.clear();
                    }
                    _ => {}
                },
                Ok(Event::Eof) => {
                    self.done = true;
                    return None;
                }
                Err(e) => {
                    // Damage past this point is unrecoverable for this file;
                    // everything already emitted stands.
                    warn!(source = %self.source_file, "XML parse error, stopping file: {e}");
                    self.skipped += 1;
                    self.done = true;
                    return None;
                }
                _ => {}
            }
            self.buf.clear();

            if let Some(record) = emit {
                return Some(record);
            }
        }
    }
}

impl<R: BufRead> Iterator for RecordStream<R> {
    type Item = PubMedRecord;

    fn next(&mut self) -> Option<PubMedRecord> {
        if self.done {
            return None;
        }
        self.next_record()
    }
}

/// Outcome of a corpus extraction pass.
#[derive(Debug, Clone, Default)]
pub struct ExtractionSummary {
    pub files: usize,
    pub records: usize,
    pub skipped: usize,
}

/// Extract every `*.xml` file under `dir` (sorted by name for determinism).
///
/// Returns the records plus a summary with the skip count. No XML files at
/// all is a `ResourceNotFound` error; a bad article inside a file is not.
pub fn extract_corpus(dir: &Path) -> Result<(Vec<PubMedRecord>, ExtractionSummary)> {
    let mut xml_files: Vec<_> = std::fs::read_dir(dir)
        .map_err(|_| {
            PharmakonError::ResourceNotFound(format!("corpus directory: {}", dir.display()))
        })?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "xml"))
        .collect();
    xml_files.sort();

    if xml_files.is_empty() {
        return Err(PharmakonError::ResourceNotFound(format!(
            "no XML files found under: {}",
            dir.display()
        )));
    }

    info!(n_files = xml_files.len(), dir = %dir.display(), "Extracting PubMed corpus");

    let mut summary = ExtractionSummary {
        files: xml_files.len(),
        ..Default::default()
    };
    let mut records = Vec::new();

    for path in &xml_files {
        let mut stream = RecordStream::open(path)?;
        let before = records.len();
        records.extend(&mut stream);
        summary.skipped += stream.skipped();
        debug!(
            file = %path.display(),
            n_records = records.len() - before,
            n_skipped = stream.skipped(),
            "File extracted"
        );
    }

    summary.records = records.len();
    info!(
        records = summary.records,
        skipped = summary.skipped,
        "Corpus extraction complete"
    );
    Ok((records, summary))
}

/// Persist extracted records as JSONL, one record per line.
pub fn write_records(records: &[PubMedRecord], path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut out = BufWriter::new(File::create(path)?);
    for record in records {
        serde_json::to_writer(&mut out, record)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    info!(n = records.len(), path = %path.display(), "Records written");
    Ok(())
}

/// Load a prior extraction. Missing file is a fatal precondition for
/// indexing, surfaced before any network calls.
pub fn load_records(path: &Path) -> Result<Vec<PubMedRecord>> {
    if !path.exists() {
        return Err(PharmakonError::ResourceNotFound(format!(
            "records file: {}",
            path.display()
        )));
    }
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        records.push(serde_json::from_str(&line)?);
    }
    Ok(records)
}
