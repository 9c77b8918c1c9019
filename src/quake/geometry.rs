use std::str::FromStr;
use tracing::warn;

use crate::config::{SettingKey, SettingsStore};
use crate::host::Rect;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HAlign {
    Left,
    #[default]
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VAlign {
    #[default]
    Top,
    Bottom,
}

impl FromStr for HAlign {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "left" => Ok(HAlign::Left),
            "center" => Ok(HAlign::Center),
            "right" => Ok(HAlign::Right),
            other => Err(anyhow::anyhow!("Unknown horizontal alignment '{}'", other)),
        }
    }
}

impl FromStr for VAlign {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "top" => Ok(VAlign::Top),
            "bottom" => Ok(VAlign::Bottom),
            other => Err(anyhow::anyhow!("Unknown vertical alignment '{}'", other)),
        }
    }
}

impl HAlign {
    /// Share of the leftover horizontal space placed left of the window
    fn leftover_fraction(self) -> f64 {
        match self {
            HAlign::Left => 0.0,
            HAlign::Center => 0.5,
            HAlign::Right => 1.0,
        }
    }
}

impl VAlign {
    /// Translation that puts a window of `height` fully outside the work area
    pub fn offscreen_offset(self, height: i32, gap: i32) -> f64 {
        let distance = f64::from(height + gap);
        match self {
            VAlign::Top => -distance,
            VAlign::Bottom => distance,
        }
    }
}

/// Size and alignment of the drop-down, as configured
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    /// Percent of the work area width
    pub width: i64,
    /// Percent of the work area height
    pub height: i64,
    pub gap: i32,
    pub halign: HAlign,
    pub valign: VAlign,
}

impl Default for Placement {
    fn default() -> Self {
        Self {
            width: 100,
            height: 50,
            gap: 0,
            halign: HAlign::Center,
            valign: VAlign::Top,
        }
    }
}

impl Placement {
    /// Read the current placement from the settings store
    ///
    /// Unknown alignment strings fall back to center/top.
    pub fn from_settings(settings: &dyn SettingsStore) -> Self {
        let halign = settings.get_string(SettingKey::HAlign);
        let valign = settings.get_string(SettingKey::VAlign);

        Self {
            width: settings.get_int(SettingKey::Width),
            height: settings.get_int(SettingKey::Height),
            gap: settings.get_int(SettingKey::Gap).clamp(0, i32::MAX as i64) as i32,
            halign: halign.parse().unwrap_or_else(|e| {
                warn!("⚠️  {}, using center", e);
                HAlign::Center
            }),
            valign: valign.parse().unwrap_or_else(|e| {
                warn!("⚠️  {}, using top", e);
                VAlign::Top
            }),
        }
    }

    /// Frame rectangle of the drop-down inside `area`
    pub fn compute(&self, area: Rect) -> Rect {
        let width = percent_of(self.width, area.width);
        let height = percent_of(self.height, area.height);

        let leftover = f64::from(area.width - width);
        let gap_adjust = match self.halign {
            HAlign::Left => self.gap,
            HAlign::Center => 0,
            HAlign::Right => -self.gap,
        };
        let x = area.x + (leftover * self.halign.leftover_fraction()).round() as i32 + gap_adjust;

        let y = match self.valign {
            VAlign::Top => area.y + self.gap,
            VAlign::Bottom => area.y + area.height - height - self.gap,
        };

        Rect::new(x, y, width, height)
    }
}

fn percent_of(percent: i64, extent: i32) -> i32 {
    (percent as f64 * f64::from(extent) / 100.0).round() as i32
}

/// Clamp a stored monitor index to the connected monitors
pub fn clamp_monitor(stored: i64, monitor_count: i32) -> i32 {
    let max = i64::from(monitor_count.max(1) - 1);
    stored.clamp(0, max) as i32
}
