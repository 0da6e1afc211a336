//! Encapsulated PostScript output

use std::io::{self, Write};
use std::path::Path;

use super::{DevicePoint, DeviceRect, DrawSink, PALETTE_SIZE};

/// `setgray` operands for each palette entry
const GRAY: [&str; PALETTE_SIZE] = [
    "1.0 G", "0.0 G", "0.1 G", "0.2 G", "0.3 G", "0.4 G", "0.5 G", "0.6 G", "0.7 G", "0.8 G",
    "0.9 G",
];

/// Values for the document structuring comments
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentInfo {
    /// `%%Title`
    pub title: String,
    /// `%%Creator`
    pub creator: String,
    /// `%%DocumentFonts`
    pub fonts: String,
}

impl DocumentInfo {
    /// Title taken from the last component of `path`
    pub fn for_path(path: impl AsRef<Path>, creator: &str, fonts: &str) -> Self {
        let full = path.as_ref().to_string_lossy();
        let full = full.trim();
        let title = match full.rfind(['/', ':', ']']) {
            Some(i) if i + 1 < full.len() => &full[i + 1..],
            Some(_) => "",
            None => full,
        };
        Self {
            title: title.to_string(),
            creator: creator.trim().to_string(),
            fonts: fonts.trim().to_string(),
        }
    }
}

/// Writes drawing primitives as a single-page EPS document
pub struct PostScriptSink<W: Write> {
    out: W,
}

impl<W: Write> PostScriptSink<W> {
    /// Write the document header and return the sink
    pub fn new(mut out: W, info: &DocumentInfo) -> io::Result<Self> {
        writeln!(out, "%!PS-Adobe-2.0 EPSF-2.0")?;
        writeln!(out, "%%Title: {}", info.title)?;
        writeln!(out, "%%Creator: {}", info.creator.trim_end())?;
        writeln!(out, "%%BoundingBox: 0 0 612 792")?;
        writeln!(out, "%%Pages: 1")?;
        writeln!(out, "%%DocumentFonts: {}", info.fonts.trim_end())?;
        writeln!(out, "%%EndComments")?;
        writeln!(out, "% ")?;
        writeln!(out, "0.1 0.1 scale")?;
        writeln!(out, "8 setlinewidth")?;
        writeln!(out, "1 setlinecap")?;
        writeln!(out, "1 setlinejoin")?;
        for (name, op) in [
            ("L", "lineto"),
            ("M", "moveto"),
            ("N", "newpath"),
            ("G", "setgray"),
            ("S", "stroke"),
        ] {
            writeln!(out, "/{name} {{{op}}} def")?;
        }
        Ok(Self { out })
    }

    /// Flush and return the writer
    pub fn into_inner(mut self) -> io::Result<W> {
        self.out.flush()?;
        Ok(self.out)
    }

    fn pair(&mut self, p: DevicePoint, op: &str) -> io::Result<()> {
        writeln!(self.out, "{} {} {}", p.x, p.y, op)
    }
}

impl<W: Write> DrawSink for PostScriptSink<W> {
    fn begin_path(&mut self) -> io::Result<()> {
        writeln!(self.out, "N")
    }

    fn move_to(&mut self, p: DevicePoint) -> io::Result<()> {
        self.pair(p, "M")
    }

    fn line_to(&mut self, p: DevicePoint) -> io::Result<()> {
        self.pair(p, "L")
    }

    fn set_gray(&mut self, palette_index: usize) -> io::Result<()> {
        writeln!(self.out, "{}", GRAY[palette_index.min(PALETTE_SIZE - 1)])
    }

    fn stroke(&mut self) -> io::Result<()> {
        writeln!(self.out, "S")
    }

    fn set_line_width(&mut self, width: i64) -> io::Result<()> {
        writeln!(self.out, "{width:3} setlinewidth")
    }

    fn write_text(&mut self, text: &str) -> io::Result<()> {
        self.out.write_all(text.as_bytes())?;
        if !text.is_empty() && !text.ends_with('\n') {
            writeln!(self.out)?;
        }
        Ok(())
    }

    fn clear_region(&mut self, r: DeviceRect) -> io::Result<()> {
        writeln!(self.out, "% ")?;
        writeln!(self.out, "% CLEAR PART OF THE PAGE")?;
        writeln!(self.out, "% ")?;
        writeln!(self.out, "N")?;
        self.pair(DevicePoint::new(r.min_x, r.min_y), "M")?;
        self.pair(DevicePoint::new(r.min_x, r.max_y), "L")?;
        self.pair(DevicePoint::new(r.max_x, r.max_y), "L")?;
        self.pair(DevicePoint::new(r.max_x, r.min_y), "L")?;
        self.pair(DevicePoint::new(r.min_x, r.min_y), "L")?;
        writeln!(self.out, "closepath")?;
        writeln!(self.out, "1 G")?;
        writeln!(self.out, "fill")?;
        writeln!(self.out, "0 G")
    }

    fn end_page(&mut self) -> io::Result<()> {
        writeln!(self.out, "showpage")?;
        self.out.flush()
    }
}
