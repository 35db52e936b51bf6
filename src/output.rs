use std::io::Write;

use crate::{
    hairpin::{Arm, Hairpin, ARMS},
    process::HairpinMap,
};

/// Write the per-hairpin summary: name, then for each arm the abundance
/// counter and the start/end heterogeneity ratios to 3 decimal places.
/// Hairpin order follows the map enumeration and is unordered
pub fn write_summary<W: Write>(wrt: &mut W, map: &HairpinMap) -> anyhow::Result<()> {
    for hp in map.hairpins() {
        write_summary_line(wrt, hp)?
    }
    Ok(())
}

fn write_summary_line<W: Write>(wrt: &mut W, hp: &Hairpin) -> anyhow::Result<()> {
    let h5 = hp.heterogeneity(Arm::Five);
    let h3 = hp.heterogeneity(Arm::Three);
    writeln!(
        wrt,
        "{}\t{}\t{:.3}\t{:.3}\t{}\t{:.3}\t{:.3}",
        hp.name(),
        hp.counter(Arm::Five),
        h5.start,
        h5.end,
        hp.counter(Arm::Three),
        h3.start,
        h3.end
    )?;
    Ok(())
}

/// Write every attributed read with its position relative to the annotated
/// arm boundaries: the original record plus start - arm start and
/// end - arm end, for downstream plotting of positional spread
pub fn write_relative<W: Write>(wrt: &mut W, map: &HairpinMap) -> anyhow::Result<()> {
    for hp in map.hairpins() {
        for arm in ARMS {
            if let Some(coords) = hp.arm(arm) {
                for rd in hp.arm_reads(arm) {
                    writeln!(
                        wrt,
                        "{}\t{}\t{}",
                        rd.record(),
                        rd.start() as isize - coords.start() as isize,
                        rd.end() as isize - coords.end() as isize
                    )?
                }
            }
        }
    }
    Ok(())
}
