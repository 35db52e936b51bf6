use std::{collections::HashMap, path::Path};

use anyhow::Context;
use compress_io::compress::CompressIo;
use regex::Regex;

use crate::{
    config::Config,
    hairpin::{parse_annotation, Hairpin, MappedRead},
    output,
    utils::get_next_line,
};

/// Parse the abundance of a collapsed read from its identifier.
/// Recognizes the seq_NNN_xCOUNT convention and bare integer identifiers;
/// anything else counts as a single read
fn read_count(re: &Regex, id: &str) -> u64 {
    re.captures(id)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<u64>().ok())
        .or_else(|| id.parse::<u64>().ok())
        .unwrap_or(1)
}

/// Name-keyed store of hairpin aggregates.  Built from the annotation
/// stream, then fed the read stream, then finalized before output
pub struct HairpinMap {
    hairpins: HashMap<String, Hairpin>,
    count_re: Regex,
}

impl HairpinMap {
    pub fn new() -> Self {
        Self {
            hairpins: HashMap::new(),
            count_re: Regex::new(r"_x(\d+)$").unwrap(),
        }
    }

    /// Ingest one mature-arm annotation record, creating the hairpin on
    /// first sight and merging subsequent records for the same name
    pub fn insert_annotation(&mut self, fields: &[&str]) -> anyhow::Result<()> {
        let (name, arm, coords) = match parse_annotation(fields)? {
            Some(x) => x,
            None => {
                debug!("Skipping record {}: not a 5p/3p mature arm", fields[3]);
                return Ok(());
            }
        };
        let hp = self
            .hairpins
            .entry(name.to_owned())
            .or_insert_with_key(|k| Hairpin::new(k.clone()));
        hp.set_arm(arm, coords);
        Ok(())
    }

    /// Ingest one library read record, attributing it to the containing arm
    /// of its hairpin.  Reads naming an unknown hairpin are skipped with a
    /// warning; reads outside both arms are dropped silently
    pub fn insert_read(&mut self, fields: &[&str]) -> anyhow::Result<()> {
        if fields.len() < 4 {
            return Err(anyhow!("Short read record ({} fields)", fields.len()));
        }
        let start = fields[1]
            .parse::<usize>()
            .with_context(|| "Error reading read start")?;
        let end = fields[2]
            .parse::<usize>()
            .with_context(|| "Error reading read end")?;
        if end <= start {
            return Err(anyhow!("Invalid read interval {}..{}", start, end));
        }
        let count = read_count(&self.count_re, fields[3]);

        let name = fields[0];
        let hp = match self.hairpins.get_mut(name) {
            Some(hp) => hp,
            None => {
                warn!(
                    "Hairpin {} not found in annotation; most likely mapping used an outdated miRBase version, or this miRNA can be assigned to more than one hairpin and the reads were deduplicated to a single one",
                    name
                );
                return Ok(());
            }
        };
        if let Some(arm) = hp.classify(start, end) {
            hp.add_read(arm, MappedRead::new(fields.join("\t"), start, end, count))
        }
        Ok(())
    }

    /// Compute heterogeneity for every hairpin.  Must be called after both
    /// input streams have been consumed and before output
    pub fn finalize(&mut self) {
        for hp in self.hairpins.values_mut() {
            hp.calculate_heterogeneity()
        }
    }

    pub fn hairpins(&self) -> impl Iterator<Item = &Hairpin> {
        self.hairpins.values()
    }

    pub fn get(&self, name: &str) -> Option<&Hairpin> {
        self.hairpins.get(name)
    }

    pub fn n_hairpins(&self) -> usize {
        self.hairpins.len()
    }
}

/// Feed each tab-split line of fname to f.  Per-line failures are parse
/// errors: they are reported with the offending line and do not stop the run
fn read_input_file<F>(fname: &Path, mut f: F) -> anyhow::Result<()>
where
    F: FnMut(&[&str]) -> anyhow::Result<()>,
{
    trace!("Opening {} for reading", fname.display());
    let mut rdr = CompressIo::new().path(fname).bufreader()?;
    let mut buf = String::new();
    let mut line = 0;
    while let Some(fields) = get_next_line(&mut rdr, &mut buf)
        .with_context(|| format!("Error after reading {} lines from {}", line, fname.display()))?
    {
        line += 1;
        if fields.len() == 1 && fields[0].is_empty() {
            // Blank line
            continue;
        }
        if let Err(e) = f(&fields) {
            warn!(
                "{}:{} {:#}; offending line: {}",
                fname.display(),
                line,
                e,
                fields.join("\t")
            )
        }
    }
    Ok(())
}

/// Strategy
///
/// Read the annotation file to completion so that both arm intervals of
/// every hairpin are known, then stream the library reads, attributing each
/// to an arm of its hairpin.  Once all reads are in, compute the per-arm
/// heterogeneity and write the summary and relative-offset outputs
pub fn process_data(cfg: &Config) -> anyhow::Result<()> {
    debug!("Starting processing");

    let mut map = HairpinMap::new();

    read_input_file(cfg.anno_file(), |fields| map.insert_annotation(fields))
        .with_context(|| "Error reading annotation file")?;
    debug!(
        "Loaded {} hairpins from {}",
        map.n_hairpins(),
        cfg.anno_file().display()
    );

    read_input_file(cfg.reads_file(), |fields| map.insert_read(fields))
        .with_context(|| "Error reading reads file")?;

    map.finalize();

    let mut wrt = CompressIo::new()
        .opt_path(cfg.output_file())
        .bufwriter()
        .with_context(|| "Failed to open summary output")?;
    output::write_summary(&mut wrt, &map)?;

    let mut rel_wrt = CompressIo::new()
        .path(cfg.relative_file())
        .bufwriter()
        .with_context(|| {
            format!(
                "Failed to open relative offset file {}",
                cfg.relative_file().display()
            )
        })?;
    output::write_relative(&mut rel_wrt, &map)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hairpin::Arm;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use std::io::Write;

    fn build_map(anno: &[&str], reads: &[&str]) -> HairpinMap {
        let mut map = HairpinMap::new();
        for l in anno {
            let fields: Vec<_> = l.split('\t').collect();
            map.insert_annotation(&fields).unwrap();
        }
        for l in reads {
            let fields: Vec<_> = l.split('\t').collect();
            map.insert_read(&fields).unwrap();
        }
        map.finalize();
        map
    }

    #[rstest]
    #[case("seq_123_x42", 42)]
    #[case("seq_1_x1", 1)]
    #[case("17", 17)]
    #[case("hsa-read-1", 1)]
    #[case("seq_x", 1)]
    fn count_from_read_id(#[case] id: &str, #[case] expected: u64) {
        let re = Regex::new(r"_x(\d+)$").unwrap();
        assert_eq!(read_count(&re, id), expected);
    }

    #[test]
    fn counters_add_up_per_arm() {
        let map = build_map(
            &[
                "hsa-let-7a-1\t5\t27\thsa-let-7a-1-5p\t0\t+",
                "hsa-let-7a-1\t54\t75\thsa-let-7a-1-3p\t0\t+",
            ],
            &[
                "hsa-let-7a-1\t5\t27\tseq_1_x3\t0\t+",
                "hsa-let-7a-1\t6\t26\tseq_2_x2\t0\t+",
                "hsa-let-7a-1\t54\t75\tseq_3_x5\t0\t+",
                // Loop read; dropped from both counters
                "hsa-let-7a-1\t30\t50\tseq_4_x9\t0\t+",
            ],
        );
        let hp = map.get("hsa-let-7a-1").unwrap();
        assert_eq!(hp.counter(Arm::Five), 5);
        assert_eq!(hp.counter(Arm::Three), 5);
        assert_eq!(hp.arm_reads(Arm::Five).len(), 2);
        assert_eq!(hp.arm_reads(Arm::Three).len(), 1);
    }

    #[test]
    fn unknown_hairpin_is_skipped() {
        let map = build_map(
            &["hsa-let-7a-1\t5\t27\thsa-let-7a-1-5p\t0\t+"],
            &["hsa-mir-9999\t5\t27\tseq_1_x1\t0\t+"],
        );
        assert_eq!(map.n_hairpins(), 1);
        let hp = map.get("hsa-let-7a-1").unwrap();
        assert_eq!(hp.counter(Arm::Five), 0);
        assert!(map.get("hsa-mir-9999").is_none());
    }

    #[test]
    fn short_read_record_is_an_error() {
        let mut map = HairpinMap::new();
        assert!(map.insert_read(&["hsa-let-7a-1", "5", "27"]).is_err());
    }

    #[test]
    fn malformed_lines_are_skipped_without_aborting() {
        let dir = tempfile::tempdir().unwrap();
        let anno_path = dir.path().join("mature2hairpin.bed");
        let reads_path = dir.path().join("library2hairpin.bed");
        let out_path = dir.path().join("summary.txt");

        let mut f = std::fs::File::create(&anno_path).unwrap();
        writeln!(f, "hsa-let-7a-1\t5\t27\thsa-let-7a-1-5p\t0\t+").unwrap();
        writeln!(f, "hsa-let-7a-1\t54\t75\thsa-let-7a-1-3p\t0\t+").unwrap();

        // Valid reads interleaved with a short record and a record with
        // non-numeric coordinates
        let mut f = std::fs::File::create(&reads_path).unwrap();
        writeln!(f, "hsa-let-7a-1\t5\t27\tseq_1_x2\t0\t+").unwrap();
        writeln!(f, "hsa-let-7a-1\t5\t27").unwrap();
        writeln!(f, "hsa-let-7a-1\tfive\t27\tseq_2_x1\t0\t+").unwrap();
        writeln!(f, "hsa-let-7a-1\t6\t27\tseq_3_x2\t0\t+").unwrap();

        let cfg = Config::new(anno_path, reads_path.clone(), Some(out_path.clone()));
        process_data(&cfg).unwrap();

        // Only the two valid reads aggregate; both outputs are still written
        let summary = std::fs::read_to_string(&out_path).unwrap();
        assert_eq!(summary, "hsa-let-7a-1\t4\t0.500\t0.000\t0\t0.000\t0.000\n");

        let relative = std::fs::read_to_string(cfg.relative_file()).unwrap();
        assert_eq!(
            relative,
            "hsa-let-7a-1\t5\t27\tseq_1_x2\t0\t+\t0\t0\n\
             hsa-let-7a-1\t6\t27\tseq_3_x2\t0\t+\t1\t0\n"
        );
    }

    #[test]
    fn end_to_end_example() {
        let dir = tempfile::tempdir().unwrap();
        let anno_path = dir.path().join("mature2hairpin.bed");
        let reads_path = dir.path().join("library2hairpin.bed");
        let out_path = dir.path().join("summary.txt");

        let mut f = std::fs::File::create(&anno_path).unwrap();
        writeln!(f, "hsa-let-7a-1\t5\t27\thsa-let-7a-1-5p\t0\t+").unwrap();
        writeln!(f, "hsa-let-7a-1\t54\t75\thsa-let-7a-1-3p\t0\t+").unwrap();

        let mut f = std::fs::File::create(&reads_path).unwrap();
        for id in ["seq_1_x1", "seq_2_x1", "seq_3_x1"] {
            writeln!(f, "hsa-let-7a-1\t5\t27\t{}\t0\t+", id).unwrap();
        }

        let cfg = Config::new(anno_path, reads_path.clone(), Some(out_path.clone()));
        process_data(&cfg).unwrap();

        let summary = std::fs::read_to_string(&out_path).unwrap();
        assert_eq!(
            summary,
            "hsa-let-7a-1\t3\t0.000\t0.000\t0\t0.000\t0.000\n"
        );

        let relative = std::fs::read_to_string(cfg.relative_file()).unwrap();
        let expected: String = ["seq_1_x1", "seq_2_x1", "seq_3_x1"]
            .iter()
            .map(|id| format!("hsa-let-7a-1\t5\t27\t{}\t0\t+\t0\t0\n", id))
            .collect();
        assert_eq!(relative, expected);
    }
}
