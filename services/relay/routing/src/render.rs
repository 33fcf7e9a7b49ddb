//! Path breadcrumbs and text colors.
//!
//! Every hop can carry a display format and tag/text colors. Colors may be
//! scoped to the channel the message is rendered for (`where_to`), so the
//! same relay can look different in the org channel than on Discord.

use crate::envelope::{EnvelopeKind, Hop, RoutableEnvelope};
use crate::error::ConfigError;
use crate::pattern::ChannelPattern;
use relay_storage::{HopColorRecord, HopFormatRecord};

/// Tag color used when no override matches
pub const DEFAULT_TAG_COLOR: &str = "#C3C3C3";
/// Text color used when no override matches
pub const DEFAULT_TEXT_COLOR: &str = "#89D2E8";
/// Format used when no format matches a hop
pub const DEFAULT_HOP_FORMAT: &str = "%s";

/// Check for `#RRGGBB`
pub fn validate_color(color: &str) -> Result<String, ConfigError> {
    let ok = color.len() == 7
        && color.starts_with('#')
        && color[1..].chars().all(|c| c.is_ascii_hexdigit());
    if ok {
        Ok(color.to_ascii_uppercase())
    } else {
        Err(ConfigError::InvalidColor(color.to_string()))
    }
}

/// Wrap text in a color tag
pub fn colorize(color: &str, text: &str) -> String {
    format!("<font color={}>{}</font>", color, text)
}

/// Color override for a hop
#[derive(Debug, Clone)]
pub struct HopColor {
    /// Hop the override applies to
    pub hop: ChannelPattern,
    /// Only when rendering for this channel
    pub where_to: Option<ChannelPattern>,
    /// Tag color
    pub tag_color: Option<String>,
    /// Text color
    pub text_color: Option<String>,
}

impl HopColor {
    /// Build from a storage record
    pub fn from_record(record: &HopColorRecord) -> Result<Self, ConfigError> {
        Ok(Self {
            hop: ChannelPattern::parse(&record.hop)?,
            where_to: record.where_to.as_deref().map(ChannelPattern::parse).transpose()?,
            tag_color: record.tag_color.as_deref().map(validate_color).transpose()?,
            text_color: record.text_color.as_deref().map(validate_color).transpose()?,
        })
    }

    /// Convert to a storage record
    pub fn to_record(&self) -> HopColorRecord {
        HopColorRecord {
            hop: self.hop.to_string(),
            where_to: self.where_to.as_ref().map(|p| p.to_string()),
            tag_color: self.tag_color.clone(),
            text_color: self.text_color.clone(),
        }
    }

    fn same_key(&self, hop: &str, where_to: Option<&str>) -> bool {
        self.hop.as_str() == hop && self.where_to.as_ref().map(|p| p.as_str()) == where_to
    }
}

/// Display format for a hop
#[derive(Debug, Clone)]
pub struct HopFormat {
    /// Hop the format applies to
    pub hop: ChannelPattern,
    /// Whether the hop shows up in the breadcrumb
    pub render: bool,
    /// Format string, `%s` is replaced by the hop label
    pub format: String,
}

impl HopFormat {
    /// Build from a storage record
    pub fn from_record(record: &HopFormatRecord) -> Result<Self, ConfigError> {
        Ok(Self {
            hop: ChannelPattern::parse(&record.hop)?,
            render: record.render,
            format: record.format.clone(),
        })
    }

    /// Convert to a storage record
    pub fn to_record(&self) -> HopFormatRecord {
        HopFormatRecord {
            hop: self.hop.to_string(),
            render: self.render,
            format: self.format.clone(),
        }
    }
}

/// Immutable rendering configuration, swapped as a whole on change
#[derive(Debug, Clone)]
pub struct RenderConfig {
    colors: Vec<HopColor>,
    formats: Vec<HopFormat>,
    default_tag_color: String,
    default_text_color: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            colors: Vec::new(),
            formats: Vec::new(),
            default_tag_color: DEFAULT_TAG_COLOR.to_string(),
            default_text_color: DEFAULT_TEXT_COLOR.to_string(),
        }
    }
}

impl RenderConfig {
    /// Create an empty configuration with the given defaults
    pub fn new(default_tag_color: &str, default_text_color: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            colors: Vec::new(),
            formats: Vec::new(),
            default_tag_color: validate_color(default_tag_color)?,
            default_text_color: validate_color(default_text_color)?,
        })
    }

    /// Same default colors, no overrides or formats
    pub fn without_overrides(&self) -> Self {
        Self {
            colors: Vec::new(),
            formats: Vec::new(),
            default_tag_color: self.default_tag_color.clone(),
            default_text_color: self.default_text_color.clone(),
        }
    }

    /// Color overrides
    pub fn colors(&self) -> &[HopColor] {
        &self.colors
    }

    /// Hop formats
    pub fn formats(&self) -> &[HopFormat] {
        &self.formats
    }

    /// Insert or replace the override keyed by `(hop, where_to)`
    pub fn upsert_color(&mut self, color: HopColor) {
        let hop = color.hop.to_string();
        let where_to = color.where_to.as_ref().map(|p| p.to_string());
        self.colors.retain(|c| !c.same_key(&hop, where_to.as_deref()));
        self.colors.push(color);
    }

    /// Remove the override keyed by `(hop, where_to)`
    pub fn remove_color(&mut self, hop: &str, where_to: Option<&str>) -> bool {
        let before = self.colors.len();
        self.colors.retain(|c| !c.same_key(hop, where_to));
        before != self.colors.len()
    }

    /// Insert or replace the format for a hop pattern
    pub fn upsert_format(&mut self, format: HopFormat) {
        self.formats.retain(|f| f.hop.as_str() != format.hop.as_str());
        self.formats.push(format);
    }

    /// Remove the format for a hop pattern
    pub fn remove_format(&mut self, hop: &str) -> bool {
        let before = self.formats.len();
        self.formats.retain(|f| f.hop.as_str() != hop);
        before != self.formats.len()
    }

    fn format_for(&self, hop: &Hop) -> Option<&HopFormat> {
        self.formats
            .iter()
            .filter(|f| f.hop.matches(hop))
            .max_by_key(|f| f.hop.specificity())
    }

    /// Most specific color with `pick` set: scoped to `for_channel` first, then unscoped
    fn color_for<'a>(
        &'a self,
        hop: &Hop,
        for_channel: &Hop,
        pick: impl Fn(&'a HopColor) -> Option<&'a String>,
    ) -> Option<&'a str> {
        let scoped = self
            .colors
            .iter()
            .filter(|c| c.hop.matches(hop))
            .filter(|c| c.where_to.as_ref().is_some_and(|w| w.matches(for_channel)))
            .filter_map(|c| pick(c).map(|color| (c, color)))
            .max_by_key(|(c, _)| c.hop.specificity());
        if let Some((_, color)) = scoped {
            return Some(color.as_str());
        }
        self.colors
            .iter()
            .filter(|c| c.hop.matches(hop) && c.where_to.is_none())
            .filter_map(|c| pick(c).map(|color| (c, color)))
            .max_by_key(|(c, _)| c.hop.specificity())
            .map(|(_, color)| color.as_str())
    }

    /// Render one hop as a colored tag, or `None` if it is hidden
    pub fn render_hop(&self, hop: &Hop, for_channel: &Hop) -> Option<String> {
        let format = self.format_for(hop);
        if format.is_some_and(|f| !f.render) {
            return None;
        }
        let text = format
            .map(|f| f.format.as_str())
            .unwrap_or(DEFAULT_HOP_FORMAT)
            .replace("%s", hop.display_label());
        let color = self
            .color_for(hop, for_channel, |c| c.tag_color.as_ref())
            .unwrap_or(self.default_tag_color.as_str());
        Some(colorize(color, &format!("[{}]", text)))
    }

    /// Breadcrumb of the envelope's path as seen from `for_channel`, oldest hop first.
    ///
    /// Empty when the envelope is routed silently or is an event that
    /// disabled path rendering.
    pub fn render_path(&self, envelope: &RoutableEnvelope, for_channel: &Hop) -> String {
        if envelope.route_silently {
            return String::new();
        }
        if let EnvelopeKind::Event(event) = &envelope.kind {
            if !event.render_path {
                return String::new();
            }
        }
        envelope
            .path
            .iter()
            .filter(|hop| !hop.same_channel(for_channel))
            .filter_map(|hop| self.render_hop(hop, for_channel))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Text color: the newest hop with an override wins
    pub fn text_color(&self, envelope: &RoutableEnvelope, for_channel: &Hop) -> &str {
        envelope
            .path
            .iter()
            .rev()
            .find_map(|hop| self.color_for(hop, for_channel, |c| c.text_color.as_ref()))
            .unwrap_or(self.default_text_color.as_str())
    }

    /// Breadcrumb plus colored text, ready for a receiver to post
    pub fn render_message(&self, envelope: &RoutableEnvelope, for_channel: &Hop) -> Option<String> {
        let text = envelope.text()?;
        let body = colorize(self.text_color(envelope, for_channel), text);
        let path = self.render_path(envelope, for_channel);
        let sender = match &envelope.character {
            Some(character) if !envelope.route_silently => format!("{}: ", character.name),
            _ => String::new(),
        };
        if path.is_empty() {
            Some(format!("{}{}", sender, body))
        } else {
            Some(format!("{} {}{}", path, sender, body))
        }
    }
}
