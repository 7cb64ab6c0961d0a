//! Sample routes around the Las Vegas Strip and Red Rock.

use serde_json::{Value, json};
use strava_maps::activity::Activity;
use strava_maps::polyline::{Coordinate, Polyline};

/// A named route with its points in travel order.
#[derive(Debug, Clone)]
pub struct Route {
    pub name: &'static str,
    pub points: &'static [Coordinate],
}

impl Route {
    pub const fn new(name: &'static str, points: &'static [Coordinate]) -> Self {
        Self { name, points }
    }

    pub fn encoded(&self) -> String {
        Polyline::new(self.points.to_vec()).encode()
    }

    pub fn start(&self) -> Coordinate {
        self.points[0]
    }

    pub fn end(&self) -> Coordinate {
        self.points[self.points.len() - 1]
    }
}

/// Bellagio fountains loop, ends where it starts.
pub const STRIP_LOOP: Route = Route::new(
    "Strip loop",
    &[
        (36.1126, -115.1767),
        (36.1162, -115.1745),
        (36.1175, -115.1695),
        (36.1107, -115.1720),
        (36.1126, -115.1767),
    ],
);

/// MGM Grand north to the Wynn.
pub const STRIP_NORTHBOUND: Route = Route::new(
    "Strip northbound",
    &[
        (36.10237, -115.16887),
        (36.10416, -115.17222),
        (36.11072, -115.17208),
        (36.11754, -115.16951),
        (36.12638, -115.16582),
    ],
);

/// Red Rock scenic loop out-and-back, roughly 0.2 degrees across.
pub const RED_ROCK: Route = Route::new(
    "Red Rock",
    &[
        (36.1352, -115.4275),
        (36.1610, -115.4430),
        (36.1940, -115.4870),
        (36.1350, -115.5060),
        (36.1290, -115.4280),
    ],
);

pub fn activity_json(id: u64, route: &Route) -> Value {
    let (start_lat, start_lng) = route.start();
    let (end_lat, end_lng) = route.end();
    json!({
        "id": id,
        "name": route.name,
        "type": "Ride",
        "start_date": "2024-05-01T06:30:00Z",
        "start_latlng": [start_lat, start_lng],
        "end_latlng": [end_lat, end_lng],
        "map": {
            "id": format!("a{}", id),
            "summary_polyline": route.encoded(),
            "resource_state": 2
        }
    })
}

pub fn activity(id: u64, route: &Route) -> Activity {
    serde_json::from_value(activity_json(id, route)).expect("valid activity fixture")
}
