//! Column names used after loading. Wide input headers are normalised to these
//! snake_case names before any reshaping happens.

pub const REGION_ID: &str = "region_id";
pub const REGION_NAME: &str = "region_name";
pub const SIZE_RANK: &str = "size_rank";
pub const INDEX: &str = "index";

/// Wide columns starting with this prefix carry a per-row historical average.
pub const HISTORIC_PREFIX: &str = "historic";

pub const DATE: &str = "date";
pub const YEAR: &str = "year";
pub const VALUE: &str = "value";
pub const HISTORIC_AVERAGE: &str = "historic_average";

pub const PRICE_TO_INCOME: &str = "price_to_income";
pub const PRICE_TO_INCOME_HIST: &str = "price_to_income_hist";
pub const MORT_AFFORD: &str = "mort_afford";
pub const MORT_AFFORD_HIST: &str = "mort_afford_hist";
pub const RENT_AFFORD: &str = "rent_afford";
pub const RENT_AFFORD_HIST: &str = "rent_afford_hist";

pub const SIZE_GROUP: &str = "size_group";

pub const LATITUDE: &str = "latitude";
pub const LONGITUDE: &str = "longitude";

/// Identifier columns every wide input must carry.
pub const ID_COLUMNS: [&str; 4] = [REGION_ID, REGION_NAME, SIZE_RANK, INDEX];

/// Join key shared by the three metric views.
pub const JOIN_KEY: [&str; 4] = [REGION_ID, REGION_NAME, SIZE_RANK, DATE];
