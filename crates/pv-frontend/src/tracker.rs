//! Moon tracker plot
//!
//! East-west offsets of moons from their planet over a time range. Time runs
//! down the page and the x axis is the offset along the planet's equator in
//! arcsec (or planet radii), with the planet and any ring zones shaded as
//! gray bands.
//!
//! The page carries its own small PostScript library (`SetLimits`, `F`/`N`/`D`
//! curve macros, tick macros) so the plot body is little more than columns of
//! numbers.

use std::fmt::{self, Write as _};
use std::io::Write;

use glam::DMat3;
use pv_core::math::{to_frame, two_vector_frame};
use pv_renderer::DocumentInfo;

use crate::ephemeris::{Correction, Ephemeris};
use crate::error::{DriverError, DriverResult};
use crate::options::{MAX_TRACKER_STEPS, TrackerOptions};
use crate::preamble::ps_string;
use crate::time::{TimeSystem, generated_stamp};

/// Radians to arcsec
const ARCSEC_PER_RADIAN: f64 = 180.0 / std::f64::consts::PI * 3600.0;
/// Smallest default x half-range, arcsec
const MIN_X_RANGE: f64 = 10.0;
/// Plot height, points
const PLOT_HEIGHT: f64 = 612.0;
/// Height of the band around a moon label kept free of other labels, points
const LABEL_BAND: f64 = 16.0;
/// Gray of the moon curves
const CURVE_GRAY: f64 = 0.0;

/// Major and minor x tick spacings
const X_MAJOR: [i64; 9] = [2, 5, 10, 20, 50, 100, 200, 500, 1000];
const X_MINOR: [i64; 9] = [1, 1, 2, 5, 10, 20, 50, 100, 200];
/// Major and minor time tick spacings, minutes
const T_MAJOR: [i64; 9] = [60, 120, 360, 720, 1440, 2880, 7200, 14400, 44640];
const T_MINOR: [i64; 9] = [15, 30, 60, 120, 360, 720, 1440, 2880, 7200];
const MINUTES_PER_DAY: i64 = 1440;
/// Width of the padded time label the visible slice is cut from
const LABEL_WIDTH: usize = 32;

const MONTH_NAMES: [&str; 12] = [
    "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
];

/// Fixed part of the page: header macros and plot layout
const TRACKER_PROLOG: &str = "%
1 setlinewidth
/TextHeight 12 def
/Helvetica findfont TextHeight scalefont setfont
/in {72 mul} def
/min {2 copy gt {exch} if pop} def
/max {2 copy lt {exch} if pop} def
/I1  2.0 in def
/I2  7.5 in def
/J1  2.0 in def
/J2 10.0 in def
/DI I2 I1 sub def
/DJ J2 J1 sub def
/Ticksize1 0.2 in def
/Ticksize2 0.1 in def
/DrawBox {newpath 0 0 moveto 0 DJ lineto
  DI DJ lineto DI 0 lineto closepath stroke} def
/ClipBox {newpath 0 0 moveto 0 DJ lineto
  DI DJ lineto DI 0 lineto closepath clip} def
/SetLimits {/Y2 exch def /Y1 exch def /X2 exch def
  /X1 exch def
  /DX X2 X1 sub def /XSCALE DI DX div def
  /DY Y2 Y1 sub def /YSCALE DJ DY div def} def
/Xcoord {X1 sub XSCALE mul} def
/Ycoord {Y1 sub YSCALE mul} def
/LabelBelow {dup stringwidth pop -0.5 mul
  TextHeight -1.3 mul rmoveto show} def
/LabelLeft {dup stringwidth pop TextHeight 0.3 mul
  add neg TextHeight -0.5 mul rmoveto show} def
/Xlabel {gsave DI 2 div TextHeight -3.0 mul
  translate 1.2 1.2 scale dup stringwidth pop
  -0.5 mul 0 moveto show grestore} def
%
% Macros for plotting ticks
% Usage: x label XT1; x XT2; y label YT1; y YT2
/XT1 {exch Xcoord dup DJ newpath moveto dup
  DJ Ticksize1 sub lineto stroke dup 0 newpath
 moveto dup Ticksize1 lineto stroke 0 moveto
  LabelBelow} def
/XT2 {Xcoord dup DJ newpath moveto dup
  DJ Ticksize2 sub lineto stroke dup 0 newpath
  moveto Ticksize2 lineto stroke} def
/YT1 {exch Ycoord dup DI exch newpath moveto dup
  DI Ticksize1 sub exch lineto stroke dup 0 exch
  newpath moveto dup Ticksize1 exch lineto stroke
  0 exch moveto LabelLeft} def
/YT2 {Ycoord dup DI exch newpath moveto dup
  DI Ticksize2 sub exch lineto stroke dup 0 exch
  newpath moveto Ticksize2 exch lineto stroke} def
%
% Macro for labeling curves
% Usage: y x label PutLab
/PutLab {gsave 3 copy pop Xcoord exch Ycoord
  translate 1 1 scale ( ) stringwidth pop
  TextHeight -0.5 mul moveto show pop pop
  grestore} def
%
% Macros for plotting curves downward
% Usage: x1 F x2 N x3 N ... xn N D stroke
/F {newpath Xcoord DJ moveto DJ YSCALE add dup} def
/N {Xcoord exch lineto YSCALE add dup} def
/D {pop pop} def
%%EndProlog
%
% shift origin
gsave I1 J1 translate
";

/// Offsets of one moon, arcsec, one per sample
#[derive(Debug, Clone, PartialEq)]
pub struct MoonTrack {
    /// Label text
    pub name: String,
    /// Offset along the equator, positive toward increasing right ascension
    pub offsets: Vec<f64>,
}

/// Everything the plot needs from the ephemeris
#[derive(Debug, Clone, PartialEq)]
pub struct TrackSamples {
    /// First sample epoch
    pub start: f64,
    /// Last requested epoch
    pub stop: f64,
    /// Spacing used to place time ticks
    pub tick_step: f64,
    /// Planet's angular radius at each sample, arcsec
    pub limb: Vec<f64>,
    /// Tracked moons in option order
    pub moons: Vec<MoonTrack>,
    /// Planet equatorial radius, km
    pub planet_radius: f64,
}

impl TrackSamples {
    /// Number of samples
    pub fn len(&self) -> usize {
        self.limb.len()
    }

    /// No samples
    pub fn is_empty(&self) -> bool {
        self.limb.is_empty()
    }

    /// Half-width of the x axis and whether it is in planet radii
    pub fn x_axis(&self, options: &TrackerOptions) -> (f64, bool) {
        let (range, scaled) = match options.x_range {
            Some(x) => (x, options.x_scaled),
            None => {
                let widest = self.limb.iter().copied().fold(0.0, f64::max);
                (2.0 * widest, false)
            }
        };
        if scaled {
            (range, true)
        } else {
            (range.max(MIN_X_RANGE), false)
        }
    }
}

/// Sample every moon's offset from the planet over the options' time range.
pub fn sample_tracks(
    options: &TrackerOptions,
    ephemeris: &dyn Ephemeris,
    time: &dyn TimeSystem,
) -> DriverResult<TrackSamples> {
    options.validate()?;
    let start = time.parse(&options.start)?;
    let stop = time.parse(&options.stop)?;
    let step = options.interval.seconds();
    let count = ((stop - start) / step) as i64 + 1;
    if count < 2 {
        return Err(DriverError::Config(
            "time range too short or interval too large".into(),
        ));
    }
    let count = count as usize;
    if count > MAX_TRACKER_STEPS {
        return Err(DriverError::Config(format!(
            "{count} time steps requested (maximum {MAX_TRACKER_STEPS})"
        )));
    }

    let planet = options.planet.id;
    let planet_radius = ephemeris.radii(planet)?.x;

    // Per-sample observer state and the frame whose x axis points at the
    // planet and whose y axis runs along its equator.
    let mut frames = Vec::with_capacity(count);
    let mut limb = Vec::with_capacity(count);
    for i in 0..count {
        let t = start + i as f64 * step;
        let observer = ephemeris.observer_state(t)?;
        let (planet_rel, lt) = ephemeris.apparent(planet, t, &observer, Correction::LightTime)?;
        let rotation = ephemeris.rotation(planet, t - lt)?.ok_or_else(|| {
            DriverError::Ephemeris(format!(
                "{} ({planet}) has no rotation model",
                options.planet.name
            ))
        })?;
        let mut pole = rotation.z_axis;
        if options.planet.reverse_pole {
            pole = -pole;
        }
        frames.push((t, observer, two_vector_frame(planet_rel.position, pole)));

        let distance = planet_rel.position.length().max(1.0e-12);
        limb.push((planet_radius / distance).min(1.0).asin() * ARCSEC_PER_RADIAN);
    }

    let mut moons = Vec::with_capacity(options.moons.len());
    for moon in options.moons.iter().filter(|m| m.show) {
        let offsets = frames
            .iter()
            .map(|(t, observer, frame)| -> DriverResult<f64> {
                let (rel, _) = ephemeris.apparent(moon.id, *t, observer, Correction::LightTime)?;
                Ok(east_west_offset(frame, rel.position))
            })
            .collect::<DriverResult<Vec<_>>>();
        match offsets {
            Ok(offsets) => moons.push(MoonTrack {
                name: moon.name.clone(),
                offsets,
            }),
            Err(e) => tracing::warn!("Skipping moon {} ({}): {}", moon.name, moon.id, e),
        }
    }

    tracing::info!(
        "Sampled {} moons of {} at {} epochs",
        moons.len(),
        options.planet.name,
        count
    );

    Ok(TrackSamples {
        start,
        stop,
        tick_step: (stop - start) / (count - 1) as f64,
        limb,
        moons,
        planet_radius,
    })
}

/// Angle of `v` from the frame's x axis toward its y axis, arcsec
fn east_west_offset(frame: &DMat3, v: glam::DVec3) -> f64 {
    let local = to_frame(frame, v);
    local.y.atan2(local.x) * ARCSEC_PER_RADIAN
}

/// Gray band between `-scale * limb` and `+scale * limb`
fn plot_band(ps: &mut String, limb: &[f64], scaled: bool, scale: f64) -> fmt::Result {
    for sign in [-1.0, 1.0] {
        if scaled {
            writeln!(
                ps,
                "{:8.2} Xcoord dup DJ newpath moveto 0 lineto",
                sign * scale
            )?;
        } else {
            for (i, l) in limb.iter().enumerate() {
                let op = if i == 0 { 'F' } else { 'N' };
                writeln!(ps, "{:8.2} {op}", sign * scale * l)?;
            }
            ps.push_str("D\n");
        }
        ps.push_str("0 Xcoord dup 0 lineto DJ lineto closepath fill\n");
    }
    Ok(())
}

/// One moon curve, labeled at its rightmost point that is still on the plot
/// and clear of earlier labels.
fn plot_moon(
    ps: &mut String,
    track: &MoonTrack,
    limb: &[f64],
    x_range: f64,
    scaled: bool,
    excluded: &mut [bool],
    band: usize,
) -> fmt::Result {
    let mut best: Option<(usize, f64)> = None;
    for (i, offset) in track.offsets.iter().enumerate() {
        let x = if scaled { offset / limb[i] } else { *offset };
        let op = if i == 0 { 'F' } else { 'N' };
        writeln!(ps, "{x:8.2} {op}")?;
        let better = best.is_none_or(|(_, max)| x > max);
        if x < x_range && better && !excluded[i] {
            best = Some((i, x));
        }
    }
    ps.push_str("D stroke\n");

    let Some((index, x)) = best else {
        return Ok(());
    };
    if x <= -x_range {
        return Ok(());
    }
    writeln!(
        ps,
        "{:4} {x:8.2} {} PutLab",
        index + 1,
        ps_string(&track.name.trim().to_uppercase())
    )?;
    let lo = index.saturating_sub(band);
    let hi = (index + band + 1).min(excluded.len());
    excluded[lo..hi].fill(true);
    Ok(())
}

/// Offset ticks along the top and bottom edges
fn label_x_axis(ps: &mut String, x_range: f64, scaled: bool, planet: &str) -> fmt::Result {
    let widest = 2.0 * x_range / 3.0;
    let i = (1..X_MAJOR.len())
        .rev()
        .find(|&i| X_MAJOR[i] as f64 <= widest)
        .unwrap_or(0);
    let (major, minor) = (X_MAJOR[i], X_MINOR[i]);

    ps.push_str("0 (0) XT1\n");
    let last = x_range as i64;
    let mut mark = minor;
    while mark <= last {
        if mark % major == 0 {
            writeln!(ps, "{mark:4} ({mark}) XT1")?;
            writeln!(ps, "{:4} (-{mark}) XT1", -mark)?;
        } else {
            writeln!(ps, "{mark:4} XT2")?;
            writeln!(ps, "{:4} XT2", -mark)?;
        }
        mark += minor;
    }
    if scaled {
        writeln!(ps, "({planet} radii) Xlabel")?;
    } else {
        ps.push_str("(Arcsec) Xlabel\n");
    }
    Ok(())
}

/// Time ticks down the left and right edges.
///
/// Major ticks carry `YYYY-MON-DD HHh` labels (or `YYYY-DDD HHh`), cut down
/// to the part that changed since the previous label.
fn label_time_axis(
    ps: &mut String,
    samples: &TrackSamples,
    time: &dyn TimeSystem,
    day_of_year: bool,
) -> DriverResult<()> {
    let (start, stop, dt) = (samples.start, samples.stop, samples.tick_step);
    let widest = (stop - start) / 60.0 / 4.0;
    let i = (1..T_MAJOR.len())
        .rev()
        .find(|&i| T_MAJOR[i] as f64 <= widest)
        .unwrap_or(0);
    let (major, minor) = (T_MAJOR[i], T_MINOR[i]);
    let last_col = if major >= 31 * MINUTES_PER_DAY {
        8
    } else if major >= MINUTES_PER_DAY {
        11
    } else {
        16
    };

    let (first_day, _) = time.day_sec(start);
    let mut ref_day = first_day;
    if major > MINUTES_PER_DAY {
        // Multi-day majors fall on a fixed cadence of days.
        ref_day -= ref_day.rem_euclid(major / MINUTES_PER_DAY);
    }
    let tick_mins = minor.min(MINUTES_PER_DAY);
    let ticks_per_day = MINUTES_PER_DAY / tick_mins;
    let secs_per_tick = 86_400.0 / ticks_per_day as f64;
    let ticks_per_major = major / tick_mins;
    let ticks_per_minor = minor / tick_mins;

    let mut prev = (i32::MIN, 0, 0);
    let mut last_major = i64::MIN / 2;
    let mut last_minor = i64::MIN / 2;
    let mut first_label = true;
    for tick in 0.. {
        let days = tick / ticks_per_day;
        let secs = (tick - days * ticks_per_day) as f64 * secs_per_tick;
        let day = ref_day + days;
        let (y, m, d) = time.ymd(day)?;
        let t = time.time_of(day, secs);
        if t > stop {
            break;
        }

        let mut is_minor = false;
        let (is_major, first_col) = if y != prev.0 {
            (true, 1)
        } else if m != prev.1 {
            (true, 6)
        } else {
            is_minor = tick >= last_minor + ticks_per_minor;
            (
                tick >= last_major + ticks_per_major,
                if d != prev.2 { 10 } else { 13 },
            )
        };
        prev = (y, m, d);
        if is_major {
            last_major = tick;
            last_minor = tick;
        } else if is_minor {
            last_minor = tick;
        }
        if t < start {
            continue;
        }

        let row = (t - start) / dt + 1.0;
        if is_major {
            let first_col = if first_label { 1 } else { first_col };
            first_label = false;
            let hour = (secs / 3600.0) as i64;
            let label = if day_of_year {
                let (_, doy) = time.year_day(day)?;
                format!("{y:4}-{doy:03} {hour:2}h")
            } else {
                format!("{y:4}-{}-{d:02} {hour:2}h", MONTH_NAMES[(m as usize - 1) % 12])
            };
            let padded = format!("{label:<LABEL_WIDTH$}");
            let text = padded.get(first_col - 1..last_col).unwrap_or("");
            writeln!(ps, "{row:7.2} ({text}) YT1")?;
        } else if is_minor {
            writeln!(ps, "{row:7.2} YT2")?;
        }
    }
    Ok(())
}

/// Title, captions and credit line
fn tracker_headings(
    ps: &mut String,
    options: &TrackerOptions,
    planet: &str,
    stamp: &str,
) -> fmt::Result {
    let title = options.title.trim();
    if !title.is_empty() {
        ps.push_str("gsave 4.5 in 10.5 in translate\n1.4 1.4 scale\n");
        writeln!(ps, "{}", ps_string(title))?;
        ps.push_str("dup stringwidth pop\n-0.5 mul TextHeight neg moveto show grestore\n");
    }

    if !options.captions.is_empty() {
        ps.push_str("gsave\n");
        writeln!(ps, "{:4} 1.25 in translate", options.align_loc as i64 + 72)?;
        ps.push_str("0 TextHeight 0.4 mul translate\n");
        for caption in &options.captions {
            ps.push_str("0 TextHeight -1.4 mul translate\n0 0 moveto\n");
            writeln!(ps, "{}\nshow", ps_string(caption.right.trim()))?;
            writeln!(ps, "{}", ps_string(&format!("{}  ", caption.left.trim())))?;
            ps.push_str("dup stringwidth pop neg 0 moveto show\n");
        }
        ps.push_str("grestore\n");
    }

    ps.push_str("gsave 1 in 0.5 in translate 0.5 0.5 scale\n0 0 moveto\n");
    writeln!(
        ps,
        "{}\nshow grestore",
        ps_string(&format!(
            "Generated by the {planet} Tracker Tool, PDS Ring-Moon Systems Node, {stamp}"
        ))
    )
}

/// Write the tracker page for already-sampled tracks.
pub fn write_track_plot(
    name: &str,
    options: &TrackerOptions,
    samples: &TrackSamples,
    time: &dyn TimeSystem,
    stamp: &str,
) -> DriverResult<String> {
    let planet = options.planet.name.trim();
    let info = DocumentInfo::for_path(
        name,
        &format!("{planet} Moon Tracker, PDS Ring-Moon Systems Node"),
        "Helvetica",
    );
    let count = samples.len();
    let (x_range, scaled) = samples.x_axis(options);
    tracing::debug!("Tracker x axis +/-{} ({})", x_range, if scaled { "radii" } else { "arcsec" });

    let mut ps = String::new();
    writeln!(
        ps,
        "%!PS-Adobe-2.0 EPSF-2.0\n%%Title: {}\n%%Creator: {}\n%%BoundingBox: 0 0 612 792\n%%Pages: 1\n%%DocumentFonts: {}\n%%EndComments",
        info.title, info.creator, info.fonts
    )?;
    ps.push_str(TRACKER_PROLOG);
    writeln!(
        ps,
        "{x_range:10.3} {:10.3} {count:6} 1 SetLimits gsave ClipBox",
        -x_range
    )?;

    for ring in options.rings.iter().rev().filter(|r| r.show) {
        writeln!(ps, "{:4.2} setgray", ring.gray)?;
        plot_band(&mut ps, &samples.limb, scaled, ring.radius / samples.planet_radius)?;
    }
    writeln!(ps, "{:4.2} setgray", options.planet_gray)?;
    plot_band(&mut ps, &samples.limb, scaled, 1.0)?;
    writeln!(ps, "{CURVE_GRAY:4.2} setgray")?;

    // Keep labels off the top and bottom edges.
    let band = (LABEL_BAND / PLOT_HEIGHT / 2.0 * count as f64) as usize;
    let mut excluded = vec![false; count];
    excluded[..(band + 1).min(count)].fill(true);
    excluded[count.saturating_sub(band + 1)..].fill(true);

    ps.push_str("ClipBox 1.5 setlinewidth\n");
    for track in &samples.moons {
        plot_moon(&mut ps, track, &samples.limb, x_range, scaled, &mut excluded, band)?;
    }
    ps.push_str("grestore DrawBox\n");

    label_x_axis(&mut ps, x_range, scaled, planet)?;
    label_time_axis(&mut ps, samples, time, options.day_of_year_labels)?;
    ps.push_str("grestore\n");

    tracker_headings(&mut ps, options, planet, stamp)?;
    ps.push_str("showpage\n");
    Ok(ps)
}

/// Sample the tracks and write the tracker page into `out`, returning the
/// writer. `name` is the output file name recorded in the document header.
pub fn draw_moon_tracks<W: Write>(
    mut out: W,
    name: &str,
    options: &TrackerOptions,
    ephemeris: &dyn Ephemeris,
    time: &dyn TimeSystem,
) -> DriverResult<W> {
    let samples = sample_tracks(options, ephemeris, time)?;
    let ps = write_track_plot(name, options, &samples, time, &generated_stamp())?;
    out.write_all(ps.as_bytes())?;
    out.flush()?;
    tracing::info!("Wrote moon tracker {}", name);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ephemeris::{BodyRecord, PoleModel, StaticEphemeris};
    use crate::options::{Caption, Interval, MoonSpec, TimeUnit, TrackerRing};
    use crate::time::UniformTime;
    use approx::assert_relative_eq;
    use glam::DVec3;

    fn system() -> StaticEphemeris {
        let body = |id: i32, name: &str, position: DVec3, radius: f64| BodyRecord {
            id,
            name: name.into(),
            position,
            velocity: DVec3::ZERO,
            radii: DVec3::splat(radius),
            pole: None,
        };
        let mut saturn = body(699, "Saturn", DVec3::new(1.4e9, 0.0, 0.0), 60268.0);
        saturn.pole = Some(PoleModel {
            ra: 0.0,
            dec: 90.0,
            w0: 0.0,
            w_rate: 0.0,
        });
        StaticEphemeris::new(399, 0.0)
            .with_body(body(399, "Earth", DVec3::ZERO, 6378.0))
            .with_body(saturn)
            .with_body(body(606, "Titan", DVec3::new(1.4e9, 1.2e6, 0.0), 2575.0))
    }

    fn options() -> TrackerOptions {
        TrackerOptions {
            moons: vec![MoonSpec::new(606, "Titan")],
            start: "2000-01-01 00:00".into(),
            stop: "2000-01-03 00:00".into(),
            ..Default::default()
        }
    }

    fn plot(options: &TrackerOptions) -> String {
        let samples = sample_tracks(options, &system(), &UniformTime).unwrap();
        write_track_plot("/tmp/track.ps", options, &samples, &UniformTime, "now").unwrap()
    }

    #[test]
    fn test_samples_offsets_and_limb() {
        let samples = sample_tracks(&options(), &system(), &UniformTime).unwrap();
        assert_eq!(samples.len(), 49);
        assert_relative_eq!(samples.tick_step, 3600.0);
        let expected = (1.2e6_f64).atan2(1.4e9) * ARCSEC_PER_RADIAN;
        assert_relative_eq!(samples.moons[0].offsets[0], expected, max_relative = 1e-12);
        assert_relative_eq!(
            samples.limb[0],
            (60268.0_f64 / 1.4e9).asin() * ARCSEC_PER_RADIAN,
            max_relative = 1e-12
        );

        let (range, scaled) = samples.x_axis(&options());
        assert!(!scaled);
        assert_relative_eq!(range, 2.0 * samples.limb[0]);
    }

    #[test]
    fn test_reversed_pole_flips_offsets() {
        let mut opts = options();
        opts.planet.reverse_pole = true;
        let samples = sample_tracks(&opts, &system(), &UniformTime).unwrap();
        assert!(samples.moons[0].offsets[0] < 0.0);
    }

    #[test]
    fn test_sample_count_limits() {
        let mut opts = options();
        opts.stop = "2000-01-01 00:30".into();
        assert!(matches!(
            sample_tracks(&opts, &system(), &UniformTime),
            Err(DriverError::Config(_))
        ));

        opts.stop = "2001-01-01 00:00".into();
        opts.interval = Interval {
            value: 1.0,
            unit: TimeUnit::Minutes,
        };
        assert!(matches!(
            sample_tracks(&opts, &system(), &UniformTime),
            Err(DriverError::Config(_))
        ));
    }

    #[test]
    fn test_sample_count_boundary() {
        // 9999 one-minute steps after the start give exactly the limit.
        let mut opts = TrackerOptions {
            stop: "2000-01-07 22:39".into(),
            interval: Interval {
                value: 1.0,
                unit: TimeUnit::Minutes,
            },
            ..options()
        };
        let samples = sample_tracks(&opts, &system(), &UniformTime).unwrap();
        assert_eq!(samples.len(), MAX_TRACKER_STEPS);

        opts.stop = "2000-01-07 22:40".into();
        match sample_tracks(&opts, &system(), &UniformTime) {
            Err(DriverError::Config(msg)) => {
                assert!(msg.contains(&format!("(maximum {MAX_TRACKER_STEPS})")), "{msg}");
            }
            other => panic!("expected a config error, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_moon_is_skipped() {
        let mut opts = options();
        opts.moons.push(MoonSpec::new(607, "Hyperion"));
        let samples = sample_tracks(&opts, &system(), &UniformTime).unwrap();
        assert_eq!(samples.moons.len(), 1);
    }

    #[test]
    fn test_x_axis_ticks() {
        let ps = plot(&options());
        assert!(ps.contains("\n0 (0) XT1\n"));
        assert!(ps.contains("\n  10 (10) XT1\n"));
        assert!(ps.contains("\n -10 (-10) XT1\n"));
        assert!(ps.contains("\n   2 XT2\n"));
        assert!(ps.contains("(Arcsec) Xlabel"));
    }

    #[test]
    fn test_time_axis_labels() {
        let ps = plot(&options());
        assert!(ps.contains("\n   1.00 (2000-JAN-01  0h ) YT1\n"));
        assert!(ps.contains("\n   3.00 YT2\n"));
        assert!(ps.contains("\n  13.00 (12h ) YT1\n"));
        assert!(ps.contains("\n  25.00 (02  0h ) YT1\n"));
        assert!(ps.contains("\n  37.00 (18h ) YT1\n"));
        assert!(ps.contains("\n  49.00 (03  0h ) YT1\n"));
    }

    #[test]
    fn test_day_of_year_labels() {
        let opts = TrackerOptions {
            day_of_year_labels: true,
            ..options()
        };
        let ps = plot(&opts);
        assert!(ps.contains("(2000-001  0h    ) YT1"));
    }

    #[test]
    fn test_moon_label_placement() {
        let opts = TrackerOptions {
            x_range: Some(300.0),
            ..options()
        };
        let ps = plot(&opts);
        assert!(ps.contains("\n   2   176.80 (TITAN) PutLab\n"));
        assert!(ps.contains("\n  50 XT2\n"));
        assert!(ps.contains("\n 200 (200) XT1\n"));
    }

    #[test]
    fn test_moon_label_blocks_neighbouring_rows() {
        let track = MoonTrack {
            name: " io ".into(),
            offsets: vec![1.0, 5.0, 3.0, 2.0, 0.0],
        };
        let limb = [1.0; 5];
        let mut excluded = [false; 5];
        let mut ps = String::new();
        plot_moon(&mut ps, &track, &limb, 10.0, false, &mut excluded, 1).unwrap();
        assert!(ps.starts_with("    1.00 F\n    5.00 N\n"));
        assert!(ps.contains("D stroke\n   2     5.00 (IO) PutLab\n"));
        assert_eq!(excluded, [true, true, true, false, false]);

        // The next curve peaks on a blocked row and is labeled lower down.
        let mut ps = String::new();
        let track = MoonTrack {
            name: "Europa".into(),
            offsets: vec![0.0, 4.0, 0.0, 1.0, 0.5],
        };
        plot_moon(&mut ps, &track, &limb, 10.0, false, &mut excluded, 1).unwrap();
        assert!(ps.ends_with("   4     1.00 (EUROPA) PutLab\n"));
    }

    #[test]
    fn test_moon_off_plot_is_not_labeled() {
        let ps = plot(&options());
        assert!(ps.contains("D stroke"));
        assert!(!ps.contains("(TITAN) PutLab"));
    }

    #[test]
    fn test_document_layout() {
        let opts = TrackerOptions {
            rings: vec![
                TrackerRing {
                    radius: 136_780.0,
                    gray: 0.75,
                    show: true,
                },
                TrackerRing {
                    radius: 180_990.0,
                    gray: 1.0,
                    show: true,
                },
            ],
            title: "Saturn (2000)".into(),
            captions: vec![Caption::new("Ephemeris:", "SAT415")],
            ..options()
        };
        let ps = plot(&opts);
        assert!(ps.starts_with("%!PS-Adobe-2.0 EPSF-2.0\n%%Title: track.ps\n"));
        assert!(ps.contains("%%Creator: Saturn Moon Tracker, PDS Ring-Moon Systems Node"));
        assert!(ps.contains("    17.759    -17.759     49 1 SetLimits gsave ClipBox"));

        let outer = ps.find("1.00 setgray").unwrap();
        let inner = ps.find("0.75 setgray").unwrap();
        let planet = ps.find("0.50 setgray").unwrap();
        assert!(outer < inner && inner < planet, "bands drawn outside in");

        assert!(ps.contains("(Saturn \\(2000\\))"));
        assert!(ps.contains(" 252 1.25 in translate\n"));
        assert!(ps.contains("(SAT415)\nshow\n(Ephemeris:  )\n"));
        assert!(ps.contains(
            "(Generated by the Saturn Tracker Tool, PDS Ring-Moon Systems Node, now)"
        ));
        assert!(ps.ends_with("showpage\n"));
    }

    #[test]
    fn test_scaled_axis() {
        let opts = TrackerOptions {
            x_range: Some(4.0),
            x_scaled: true,
            ..options()
        };
        let ps = plot(&opts);
        assert!(ps.contains("(Saturn radii) Xlabel"));
        assert!(ps.contains("   -1.00 Xcoord dup DJ newpath moveto 0 lineto"));
    }
}
