use std::fmt;

use anyhow::Context;

/// The two annotated mature arms of a hairpin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arm {
    Five,
    Three,
}

pub const ARMS: [Arm; 2] = [Arm::Five, Arm::Three];

impl Arm {
    fn ix(self) -> usize {
        match self {
            Self::Five => 0,
            Self::Three => 1,
        }
    }

    /// Determine arm identity from the mature miRNA name (i.e., hsa-let-7a-5p).
    /// Names not ending in 5p/3p are not mature arm products
    pub fn from_mature_name(s: &str) -> Option<Self> {
        if s.ends_with("5p") {
            Some(Self::Five)
        } else if s.ends_with("3p") {
            Some(Self::Three)
        } else {
            None
        }
    }
}

impl fmt::Display for Arm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Five => write!(f, "5'"),
            Self::Three => write!(f, "3'"),
        }
    }
}

/// 0-based, half-open interval of a mature arm on its hairpin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArmCoords {
    start: usize,
    end: usize,
}

impl ArmCoords {
    pub fn new(start: usize, end: usize) -> anyhow::Result<Self> {
        if end > start {
            Ok(Self { start, end })
        } else {
            Err(anyhow!("Invalid arm interval {}..{}", start, end))
        }
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.end
    }

    /// Containment test used for read attribution
    fn contains(&self, start: usize, end: usize) -> bool {
        start >= self.start && start < self.end && end > self.start && end <= self.end
    }
}

impl fmt::Display for ArmCoords {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Parse a mature-arm annotation record: hairpin name, start, end, mature name.
/// Returns None when the mature name does not indicate a 5'/3' arm
pub fn parse_annotation<'a>(
    fields: &[&'a str],
) -> anyhow::Result<Option<(&'a str, Arm, ArmCoords)>> {
    if fields.len() < 4 {
        return Err(anyhow!("Short annotation record ({} fields)", fields.len()));
    }
    let arm = match Arm::from_mature_name(fields[3]) {
        Some(a) => a,
        None => return Ok(None),
    };
    let start = fields[1]
        .parse::<usize>()
        .with_context(|| "Error reading arm start")?;
    let end = fields[2]
        .parse::<usize>()
        .with_context(|| "Error reading arm end")?;
    Ok(Some((fields[0], arm, ArmCoords::new(start, end)?)))
}

/// A library read attributed to one arm of a hairpin
#[derive(Debug)]
pub struct MappedRead {
    // Original input record, needed for the relative offset output
    record: String,
    start: usize,
    end: usize,
    count: u64,
}

impl MappedRead {
    pub fn new(record: String, start: usize, end: usize, count: u64) -> Self {
        Self {
            record,
            start,
            end,
            count,
        }
    }

    pub fn record(&self) -> &str {
        &self.record
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.end
    }

    pub fn count(&self) -> u64 {
        self.count
    }
}

/// Fraction of attributed abundance whose boundary differs from the
/// annotated arm boundary.  Defaults to 0 for arms without reads
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Heterogeneity {
    pub start: f64,
    pub end: f64,
}

/// Per-hairpin aggregate: the two annotated arm intervals (merged from one
/// record per arm), the reads attributed to each arm, and the summary
/// statistics computed once all reads have been seen
#[derive(Debug)]
pub struct Hairpin {
    name: String,
    arms: [Option<ArmCoords>; 2],
    reads: [Vec<MappedRead>; 2],
    counters: [u64; 2],
    het: [Heterogeneity; 2],
}

impl Hairpin {
    pub fn new(name: String) -> Self {
        Self {
            name,
            arms: [None; 2],
            reads: [Vec::new(), Vec::new()],
            counters: [0; 2],
            het: [Heterogeneity::default(); 2],
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arm(&self, arm: Arm) -> Option<ArmCoords> {
        self.arms[arm.ix()]
    }

    pub fn arm_reads(&self, arm: Arm) -> &[MappedRead] {
        &self.reads[arm.ix()]
    }

    pub fn counter(&self, arm: Arm) -> u64 {
        self.counters[arm.ix()]
    }

    pub fn heterogeneity(&self, arm: Arm) -> Heterogeneity {
        self.het[arm.ix()]
    }

    /// Merge an annotation record for one arm.  The first annotation seen
    /// for an arm wins; a later record with different coordinates indicates
    /// a version skew between mature.fa and hairpin.fa and only warns
    pub fn set_arm(&mut self, arm: Arm, coords: ArmCoords) {
        match self.arms[arm.ix()] {
            None => self.arms[arm.ix()] = Some(coords),
            Some(prev) if prev != coords => warn!(
                "Hairpin {}: conflicting annotation {} for {} arm (keeping {}); mature.fa and hairpin.fa versions probably differ",
                self.name, coords, arm, prev
            ),
            Some(_) => (),
        }
    }

    /// Attribute a read interval to the arm containing it, testing the 5'
    /// arm first.  Reads outside both arms (loop or flank) return None
    pub fn classify(&self, start: usize, end: usize) -> Option<Arm> {
        ARMS.into_iter()
            .find(|a| self.arms[a.ix()].map_or(false, |c| c.contains(start, end)))
    }

    pub fn add_read(&mut self, arm: Arm, rd: MappedRead) {
        self.counters[arm.ix()] += rd.count;
        self.reads[arm.ix()].push(rd)
    }

    /// Compute start/end heterogeneity for both arms.  Called once, after
    /// all reads have been ingested
    pub fn calculate_heterogeneity(&mut self) {
        for arm in ARMS {
            let i = arm.ix();
            let total = self.counters[i];
            if total == 0 {
                // No attributed reads; heterogeneity stays at the 0 default
                continue;
            }
            let coords = self.arms[i].expect("reads attributed to unannotated arm");
            let mut at_start = 0;
            let mut at_end = 0;
            for rd in &self.reads[i] {
                if rd.start == coords.start {
                    at_start += rd.count
                }
                if rd.end == coords.end {
                    at_end += rd.count
                }
            }
            let total = total as f64;
            self.het[i] = Heterogeneity {
                start: 1.0 - (at_start as f64) / total,
                end: 1.0 - (at_end as f64) / total,
            }
        }
    }
}
