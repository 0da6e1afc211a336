//! PostScript text for the planetary view page: label macros, title,
//! captions, footer and axis titles.
//!
//! The drawing itself runs at ten device units per point, so every block
//! that places text in points starts with `unscale`.

use pv_core::math::round_half_away;

use crate::options::Caption;

/// Moon label size that maps to a unit label scale
const LABEL_PTS_PER_SCALE: f64 = 12.0;
/// Largest moon label scale
const MAX_LABEL_SCALE: f64 = 2.0;
/// Points per inch
const POINTS_PER_INCH: i64 = 72;

/// Escape `text` and wrap it as a PostScript string literal.
///
/// Backslashes and parentheses are escaped and the degree sign becomes the
/// octal code of the Latin-1 degree glyph.
pub fn ps_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('(');
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '(' => out.push_str("\\("),
            ')' => out.push_str("\\)"),
            '\u{b0}' => out.push_str("\\260"),
            c => out.push(c),
        }
    }
    out.push(')');
    out
}

/// Fonts and label macros. `LabelBelow` and `LabelLeft` write axis numbers
/// at the current point; `LabelBody` writes a moon or star name scaled for
/// `moon_label_pts`.
pub fn view_prolog(moon_label_pts: f64) -> String {
    let scale = if moon_label_pts > 0.0 {
        (moon_label_pts / LABEL_PTS_PER_SCALE).min(MAX_LABEL_SCALE)
    } else {
        1.0
    };
    let mut ps = String::from(
        "/MakeDegreeFont {
findfont dup /CharStrings get /degree known {
dup length dict /newdict exch def {
1 index /FID ne { newdict 3 1 roll put }
{ pop pop } ifelse } forall
newdict /Encoding get dup length array copy
newdict exch /Encoding exch put
newdict /CharStrings get /degree known {
newdict /Encoding get 8#260 /degree put } if
newdict true } { pop false } ifelse } def
/MyFont /Helvetica  MakeDegreeFont { definefont pop } if
/unscale {10 10 scale} def
/TextHeight {11} def
/MyFont findfont TextHeight scalefont setfont
/LabelBelow {gsave currentpoint translate
unscale
dup stringwidth pop -0.5 mul TextHeight -1.3 mul
moveto show grestore} def
/LabelLeft {gsave currentpoint translate
unscale 90 rotate
dup stringwidth pop -0.5 mul TextHeight 0.3 mul
moveto show grestore} def
/LabelBody {gsave currentpoint translate
unscale
",
    );
    ps.push_str(&format!("{scale:.3} {scale:.3} scale\n"));
    ps.push_str(
        "TextHeight 0.2 mul dup
moveto show grestore} def
%%EndProlog
%",
    );
    ps
}

/// Title, captions, credit line and axis titles.
pub fn view_headings(
    planet: &str,
    title: &str,
    captions: &[Caption],
    align_loc: f64,
    stamp: &str,
) -> String {
    let mut ps = String::new();
    let title = title.trim();
    if !title.is_empty() {
        ps.push_str("gsave unscale 324 756 translate 1.4 1.4 scale\n");
        ps.push_str(&format!("{}\n", ps_string(title)));
        ps.push_str("dup stringwidth pop\n-0.5 mul TextHeight neg moveto show grestore\n");
    }

    if !captions.is_empty() {
        let column = round_half_away(align_loc) as i64 + POINTS_PER_INCH;
        ps.push_str("gsave unscale\n");
        ps.push_str(&format!("{column:4} 162 translate\n"));
        ps.push_str("0 TextHeight 0.4 mul translate\n");
        for caption in captions {
            ps.push_str("0 TextHeight -1.25 mul translate\n0 0 moveto\n");
            ps.push_str(&format!("{}\nshow\n", ps_string(caption.right.trim_end())));
            let left = format!("{}  ", caption.left.trim_end());
            ps.push_str(&format!("{}\n", ps_string(&left)));
            ps.push_str("dup stringwidth pop neg 0 moveto show\n");
        }
        ps.push_str("grestore\n");
    }

    ps.push_str(&format!(
        "gsave unscale {POINTS_PER_INCH} 36 translate 0.5 0.5 scale\n0 0 moveto\n"
    ));
    let credit = format!("Generated by the {planet} Viewer Tool, PDS Ring-Moon Systems Node, {stamp}");
    ps.push_str(&format!("{}\nshow grestore\n", ps_string(&credit)));

    ps.push_str(
        "gsave unscale
324 180 translate 1.2 1.2 scale
(Right Ascension (h m s)) dup stringwidth pop
-0.5 mul 0 moveto show grestore
gsave unscale
36 450 translate 1.2 1.2 scale 90 rotate
(Declination (d m s)) dup stringwidth pop
-0.5 mul TextHeight neg moveto show grestore",
    );
    ps
}
