use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::Serialize;

use crate::error::{ProfileError, Result};

const DEFAULT_COLORSPACE: u32 = 601;

/// A video rendering profile as described by an MLT profile file.
///
/// Profiles that fail to load are still represented, with
/// [`VideoProfile::is_valid`] returning `false`, so callers can report them
/// without handling a separate error path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VideoProfile {
    /// File this profile was read from
    pub path: PathBuf,
    pub description: String,
    pub width: u32,
    pub height: u32,
    pub frame_rate_num: u32,
    pub frame_rate_den: u32,
    pub progressive: bool,
    pub sample_aspect_num: u32,
    pub sample_aspect_den: u32,
    pub display_aspect_num: u32,
    pub display_aspect_den: u32,
    pub colorspace: u32,
    #[serde(skip)]
    valid: bool,
}

/// The technical parameters a profile is matched on, see
/// [`VideoProfile::matches`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProfileParams {
    pub width: u32,
    pub height: u32,
    pub frame_rate_num: u32,
    pub frame_rate_den: u32,
    pub progressive: bool,
    pub sample_aspect_num: u32,
    pub sample_aspect_den: u32,
    pub display_aspect_num: u32,
    pub display_aspect_den: u32,
}

impl VideoProfile {
    /// Read and parse a profile file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| ProfileError::io(path, e))?;
        Self::parse_str(&text, path)
    }

    /// Parse profile text; `path` is only recorded, never opened.
    ///
    /// Lines are `key=value`. Blank lines, `#` comments and unknown keys are
    /// ignored. A missing `description` falls back to the file name.
    pub fn parse_str(text: &str, path: &Path) -> Result<Self> {
        let mut description = None;
        let mut width = None;
        let mut height = None;
        let mut frame_rate_num = None;
        let mut frame_rate_den = None;
        let mut progressive = false;
        let mut sample_aspect_num = None;
        let mut sample_aspect_den = None;
        let mut display_aspect_num = None;
        let mut display_aspect_den = None;
        let mut colorspace = DEFAULT_COLORSPACE;

        for (index, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            let value = value.trim();
            let number = || parse_number(key, value, index + 1);

            match key {
                "description" => description = Some(value.to_string()),
                "width" => width = Some(number()?),
                "height" => height = Some(number()?),
                "frame_rate_num" => frame_rate_num = Some(number()?),
                "frame_rate_den" => frame_rate_den = Some(number()?),
                "progressive" => progressive = number()? != 0,
                "sample_aspect_num" => sample_aspect_num = Some(number()?),
                "sample_aspect_den" => sample_aspect_den = Some(number()?),
                "display_aspect_num" => display_aspect_num = Some(number()?),
                "display_aspect_den" => display_aspect_den = Some(number()?),
                "colorspace" => colorspace = number()?,
                _ => {}
            }
        }

        let width = width.ok_or(ProfileError::MissingField("width"))?;
        let height = height.ok_or(ProfileError::MissingField("height"))?;
        let frame_rate_num = frame_rate_num.ok_or(ProfileError::MissingField("frame_rate_num"))?;
        let frame_rate_den = frame_rate_den.ok_or(ProfileError::MissingField("frame_rate_den"))?;
        let sample_aspect_num = sample_aspect_num.unwrap_or(1);
        let sample_aspect_den = sample_aspect_den.unwrap_or(1);

        // Without an explicit display aspect, derive it from the frame size
        // and pixel aspect. An underivable aspect leaves the profile invalid.
        let (display_aspect_num, display_aspect_den) = match (display_aspect_num, display_aspect_den)
        {
            (Some(num), Some(den)) => (num, den),
            _ => display_aspect_for(width, height, sample_aspect_num, sample_aspect_den)
                .unwrap_or((0, 0)),
        };

        let description = description
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| file_label(path));

        let mut profile = Self {
            path: path.to_path_buf(),
            description,
            width,
            height,
            frame_rate_num,
            frame_rate_den,
            progressive,
            sample_aspect_num,
            sample_aspect_den,
            display_aspect_num,
            display_aspect_den,
            colorspace,
            valid: false,
        };
        profile.valid = profile.check();
        Ok(profile)
    }

    /// Placeholder for a file that could not be read or parsed.
    pub fn invalid(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            description: file_label(path),
            width: 0,
            height: 0,
            frame_rate_num: 0,
            frame_rate_den: 0,
            progressive: false,
            sample_aspect_num: 0,
            sample_aspect_den: 0,
            display_aspect_num: 0,
            display_aspect_den: 0,
            colorspace: DEFAULT_COLORSPACE,
            valid: false,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn fps(&self) -> f64 {
        if self.frame_rate_den == 0 {
            return 0.0;
        }
        f64::from(self.frame_rate_num) / f64::from(self.frame_rate_den)
    }

    /// Frame rates and aspect ratios are compared as rationals, so
    /// `30000/1001` matches `60000/2002`.
    pub fn matches(&self, params: &ProfileParams) -> bool {
        self.width == params.width
            && self.height == params.height
            && self.progressive == params.progressive
            && same_ratio(
                (self.frame_rate_num, self.frame_rate_den),
                (params.frame_rate_num, params.frame_rate_den),
            )
            && same_ratio(
                (self.sample_aspect_num, self.sample_aspect_den),
                (params.sample_aspect_num, params.sample_aspect_den),
            )
            && same_ratio(
                (self.display_aspect_num, self.display_aspect_den),
                (params.display_aspect_num, params.display_aspect_den),
            )
    }

    fn check(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.frame_rate_num > 0
            && self.frame_rate_den > 0
            && self.sample_aspect_den > 0
            && self.display_aspect_den > 0
    }
}

/// Turns a candidate file into a profile.
///
/// Implementations must not fail: anything unreadable comes back as a profile
/// whose `is_valid()` is `false`.
pub trait ProfileParser: Send + Sync {
    fn parse(&self, path: &Path) -> VideoProfile;
}

impl<F> ProfileParser for F
where
    F: Fn(&Path) -> VideoProfile + Send + Sync,
{
    fn parse(&self, path: &Path) -> VideoProfile {
        self(path)
    }
}

/// Parser for MLT `key=value` profile files.
#[derive(Debug, Clone, Copy, Default)]
pub struct MltProfileParser;

impl ProfileParser for MltProfileParser {
    fn parse(&self, path: &Path) -> VideoProfile {
        match VideoProfile::load(path) {
            Ok(profile) => profile,
            Err(e) => {
                tracing::debug!("Could not load profile {}: {}", path.display(), e);
                VideoProfile::invalid(path)
            }
        }
    }
}

fn parse_number(key: &str, value: &str, line: usize) -> Result<u32> {
    value.parse().map_err(|_| ProfileError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        line,
    })
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn same_ratio(a: (u32, u32), b: (u32, u32)) -> bool {
    if a.1 == 0 || b.1 == 0 {
        return a == b;
    }
    u64::from(a.0) * u64::from(b.1) == u64::from(b.0) * u64::from(a.1)
}

/// Display aspect of a `width`x`height` frame with the given pixel aspect,
/// reduced to lowest terms.
///
/// `None` when the reduced ratio does not fit in `u32`.
pub fn display_aspect_for(
    width: u32,
    height: u32,
    sample_aspect_num: u32,
    sample_aspect_den: u32,
) -> Option<(u32, u32)> {
    let num = u64::from(width) * u64::from(sample_aspect_num);
    let den = u64::from(height) * u64::from(sample_aspect_den);
    let divisor = gcd(num, den).max(1);
    Some((
        u32::try_from(num / divisor).ok()?,
        u32::try_from(den / divisor).ok()?,
    ))
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}
