//! Resort directory
//!
//! Immutable table of supported ski resorts, built once on first use and
//! queried by stable identifier or URL slug.

use std::sync::LazyLock;

use serde::Serialize;

use crate::models::Coordinates;

const DEFAULT_GRADIENT: &str = "from-gray-700 via-gray-600 to-gray-500";
const DEFAULT_ICON: &str = "⛷️";

/// A ski resort record
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Resort {
    pub id: &'static str,
    pub name: &'static str,
    pub slug: &'static str,
    /// ISO 3166-1 alpha-2 country code
    pub country: &'static str,
    pub region: &'static str,
    pub lat: f64,
    pub lon: f64,
    /// IANA timezone name
    pub tz: &'static str,
    /// Summit elevation in feet
    pub elevation: u32,
}

impl Resort {
    #[must_use]
    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.lat, self.lon)
    }

    /// Background gradient classes used by the resort card
    #[must_use]
    pub fn gradient(&self) -> &'static str {
        theme(self.id).map_or(DEFAULT_GRADIENT, |(gradient, _)| gradient)
    }

    #[must_use]
    pub fn icon(&self) -> &'static str {
        theme(self.id).map_or(DEFAULT_ICON, |(_, icon)| icon)
    }
}

/// Lookup over a fixed list of resorts
#[derive(Debug)]
pub struct ResortDirectory {
    resorts: Vec<Resort>,
}

static BUILTIN: LazyLock<ResortDirectory> = LazyLock::new(|| ResortDirectory {
    resorts: builtin_resorts(),
});

impl ResortDirectory {
    /// The built-in directory, ordered west to east
    #[must_use]
    pub fn builtin() -> &'static ResortDirectory {
        &BUILTIN
    }

    #[must_use]
    pub fn all(&self) -> &[Resort] {
        &self.resorts
    }

    #[must_use]
    pub fn by_id(&self, id: &str) -> Option<&Resort> {
        self.resorts.iter().find(|r| r.id == id)
    }

    #[must_use]
    pub fn by_slug(&self, slug: &str) -> Option<&Resort> {
        self.resorts.iter().find(|r| r.slug == slug)
    }
}

fn theme(id: &str) -> Option<(&'static str, &'static str)> {
    let theme = match id {
        "palisades-tahoe" => ("from-blue-600 via-blue-500 to-cyan-400", "⛷️"),
        "mammoth-mountain" => ("from-purple-600 via-purple-500 to-pink-400", "🏔️"),
        "big-sky" => ("from-indigo-600 via-indigo-500 to-blue-400", "🌄"),
        "jackson-hole" => ("from-slate-700 via-slate-600 to-gray-500", "⛰️"),
        "alta" => ("from-blue-700 via-blue-600 to-sky-400", "❄️"),
        "snowbird" => ("from-sky-600 via-sky-500 to-blue-400", "🦅"),
        "deer-valley" => ("from-emerald-600 via-emerald-500 to-teal-400", "🦌"),
        "solitude" => ("from-violet-600 via-violet-500 to-purple-400", "🌲"),
        "aspen-snowmass" => ("from-orange-600 via-orange-500 to-red-400", "🍂"),
        "steamboat" => ("from-yellow-600 via-yellow-500 to-orange-400", "🚂"),
        "winter-park" => ("from-green-600 via-green-500 to-emerald-400", "🌲"),
        "copper-mountain" => ("from-amber-700 via-amber-600 to-orange-500", "⛰️"),
        "eldora" => ("from-teal-600 via-teal-500 to-cyan-400", "🏔️"),
        "taos" => ("from-rose-600 via-rose-500 to-pink-400", "🌵"),
        "stratton" => ("from-green-700 via-green-600 to-emerald-500", "🍁"),
        _ => return None,
    };
    Some(theme)
}

const fn resort(
    id: &'static str,
    name: &'static str,
    region: &'static str,
    lat: f64,
    lon: f64,
    tz: &'static str,
    elevation: u32,
) -> Resort {
    Resort {
        id,
        name,
        slug: id,
        country: "US",
        region,
        lat,
        lon,
        tz,
        elevation,
    }
}

fn builtin_resorts() -> Vec<Resort> {
    vec![
        resort("palisades-tahoe", "Palisades Tahoe", "California", 39.1978, -120.2357, "America/Los_Angeles", 9045),
        resort("mammoth-mountain", "Mammoth Mountain", "California", 37.6308, -119.0326, "America/Los_Angeles", 11053),
        resort("big-sky", "Big Sky Resort", "Montana", 45.2849, -111.4083, "America/Denver", 11166),
        resort("jackson-hole", "Jackson Hole", "Wyoming", 43.5872, -110.8278, "America/Denver", 10449),
        resort("alta", "Alta", "Utah", 40.5885, -111.6387, "America/Denver", 10548),
        resort("snowbird", "Snowbird", "Utah", 40.5832, -111.6573, "America/Denver", 11000),
        resort("deer-valley", "Deer Valley", "Utah", 40.6374, -111.4783, "America/Denver", 9570),
        resort("solitude", "Solitude Mountain Resort", "Utah", 40.6199, -111.5919, "America/Denver", 10035),
        resort("aspen-snowmass", "Aspen Snowmass", "Colorado", 39.2130, -106.9479, "America/Denver", 12510),
        resort("steamboat", "Steamboat", "Colorado", 40.4572, -106.8047, "America/Denver", 10568),
        resort("winter-park", "Winter Park Resort", "Colorado", 39.8868, -105.7625, "America/Denver", 10800),
        resort("copper-mountain", "Copper Mountain", "Colorado", 39.5021, -106.1506, "America/Denver", 12313),
        resort("eldora", "Eldora Mountain Resort", "Colorado", 39.9372, -105.5828, "America/Denver", 10800),
        resort("taos", "Taos Ski Valley", "New Mexico", 36.5928, -105.4467, "America/Denver", 12480),
        resort("stratton", "Stratton Mountain", "Vermont", 43.1136, -72.9083, "America/New_York", 3875),
    ]
}
