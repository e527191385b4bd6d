use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;

/// A line-oriented reader over local text, plain or gzip/bgzip compressed.
///
/// Lines are handed out without their trailing `\n` / `\r\n`; the returned slice
/// is only valid until the next call.
pub trait TextSource {
    fn next_line<'a>(&'a mut self) -> io::Result<Option<&'a [u8]>>;
}

struct LocalTextSource<R: BufRead> {
    reader: R,
    line: Vec<u8>,
    path_display: String,
}

impl<R: BufRead> LocalTextSource<R> {
    fn new(reader: R, path: &Path) -> Self {
        Self {
            reader,
            line: Vec::with_capacity(1024),
            path_display: path.display().to_string(),
        }
    }
}

impl<R: BufRead> TextSource for LocalTextSource<R> {
    fn next_line<'a>(&'a mut self) -> io::Result<Option<&'a [u8]>> {
        self.line.clear();
        let bytes_read = self.reader.read_until(b'\n', &mut self.line).map_err(|e| {
            io::Error::new(e.kind(), format!("Error reading {}: {e}", self.path_display))
        })?;

        if bytes_read == 0 {
            return Ok(None);
        }

        if self.line.last() == Some(&b'\n') {
            self.line.pop();
        }
        if self.line.last() == Some(&b'\r') {
            self.line.pop();
        }
        Ok(Some(&self.line))
    }
}

fn has_gzip_magic(path: &Path) -> io::Result<bool> {
    let mut magic = [0u8; 2];
    let mut file = File::open(path)?;
    let n = file.read(&mut magic)?;
    Ok(n == 2 && magic == [0x1f, 0x8b])
}

/// Opens `path` for line-by-line reading, transparently decompressing gzip and
/// bgzip input (detected from the magic bytes, not the extension).
pub fn open_text_source(path: &Path) -> io::Result<Box<dyn TextSource>> {
    let file = File::open(path)
        .map_err(|e| io::Error::new(e.kind(), format!("Opening {}: {e}", path.display())))?;

    if has_gzip_magic(path)? {
        log::debug!("Reading {} as gzip-compressed text", path.display());
        let reader = BufReader::new(MultiGzDecoder::new(file));
        Ok(Box::new(LocalTextSource::new(reader, path)))
    } else {
        Ok(Box::new(LocalTextSource::new(BufReader::new(file), path)))
    }
}
