//! Market seed: synthetic buy/sell orders for the stations of a region.
//!
//! The seed runs as a single in-memory migration, `SEED_MARKET`, tracked in the
//! `seed_migrations` ledger so it is applied at most once per database.

use tracing::debug;

use crate::error::{AppError, AppResult};

use super::Migration;

/// Id of the seed migration.
pub const SEED_MIGRATION_ID: &str = "SEED_MARKET";

/// Seed query for one region. `RVAL` is the region id, `SVAL` the fraction of
/// the region's stations that receive orders.
const SEED_TEMPLATE: &str = "set @regionid=RVAL; set @saturation=SVAL; create temporary table if not exists tStations (stationId int, solarSystemID int, regionID int, corporationID int, security float); truncate table tStations; select round(count(stationID)*@saturation) into @lim from staStations where regionID=@regionid ; set @i=0; insert into tStations   select stationID,solarSystemID,regionID, corporationID, security from staStations where (@i:=@i+1)<=@lim AND regionID=@regionid  order by rand(); INSERT INTO mktOrders (typeID, ownerID, regionID, stationID, price, volEntered, volRemaining, issued, minVolume, duration, solarSystemID, jumps)   SELECT typeID, corporationID, regionID, stationID, basePrice / security, 550, 550, 132478179209572976, 1, 250, solarSystemID, 1   FROM tStations, invTypes inner join invGroups USING (groupID)   WHERE invTypes.published = 1   AND invGroups.categoryID IN (4, 5, 6, 7, 8, 9, 16, 17, 18, 22, 23, 24, 25, 32, 34, 35, 39, 40, 41, 42, 43, 46); UPDATE mktOrders SET price = 100 WHERE price = 0;";

/// Region names accepted by the seed, with their ids.
pub const REGIONS: &[(&str, i64)] = &[
    ("Derelik", 10000001),
    ("The Forge", 10000002),
    ("Vale of the Silent", 10000003),
    ("UUA-F4", 10000004),
    ("Detorid", 10000005),
    ("Wicked Creek", 10000006),
    ("Cache", 10000007),
    ("Scalding Pass", 10000008),
    ("Insmother", 10000009),
    ("Tribute", 10000010),
    ("Great Wildlands", 10000011),
    ("Curse", 10000012),
    ("Malpais", 10000013),
    ("Catch", 10000014),
    ("Venal", 10000015),
    ("Lonetrek", 10000016),
    ("J7HZ-F", 10000017),
    ("The Spire", 10000018),
    ("A821-A", 10000019),
    ("Tash-Murkon", 10000020),
    ("Outer Passage", 10000021),
    ("Stain", 10000022),
    ("Pure Blind", 10000023),
    ("Immensea", 10000025),
    ("Etherium Reach", 10000027),
    ("Molden Heath", 10000028),
    ("Geminate", 10000029),
    ("Heimatar", 10000030),
    ("Impass", 10000031),
    ("Sinq Laison", 10000032),
    ("The Citadel", 10000033),
    ("The Kalevala Expanse", 10000034),
    ("Deklein", 10000035),
    ("Devoid", 10000036),
    ("Everyshore", 10000037),
    ("The Bleak Lands", 10000038),
    ("Esoteria", 10000039),
    ("Oasa", 10000040),
    ("Syndicate", 10000041),
    ("Metropolis", 10000042),
    ("Domain", 10000043),
    ("Solitude", 10000044),
    ("Tenal", 10000045),
    ("Fade", 10000046),
    ("Providence", 10000047),
    ("Placid", 10000048),
    ("Khanid", 10000049),
    ("Querious", 10000050),
    ("Cloud Ring", 10000051),
    ("Kador", 10000052),
    ("Cobalt Edge", 10000053),
    ("Aridia", 10000054),
    ("Branch", 10000055),
    ("Feythabolis", 10000056),
    ("Outer Ring", 10000057),
    ("Fountain", 10000058),
    ("Paragon Soul", 10000059),
    ("Delve", 10000060),
    ("Tenerifis", 10000061),
    ("Omist", 10000062),
    ("Period Basis", 10000063),
    ("Essence", 10000064),
    ("Kor-Azor", 10000065),
    ("Perrigen Falls", 10000066),
    ("Genesis", 10000067),
    ("Verge Vendor", 10000068),
    ("Black Rise", 10000069),
    ("A-R00001", 11000001),
    ("A-R00002", 11000002),
    ("A-R00003", 11000003),
    ("B-R00004", 11000004),
    ("B-R00005", 11000005),
    ("B-R00006", 11000006),
    ("B-R00007", 11000007),
    ("B-R00008", 11000008),
    ("C-R00009", 11000009),
    ("C-R00010", 11000010),
    ("C-R00011", 11000011),
    ("C-R00012", 11000012),
    ("C-R00013", 11000013),
    ("C-R00014", 11000014),
    ("C-R00015", 11000015),
    ("D-R00016", 11000016),
    ("D-R00017", 11000017),
    ("D-R00018", 11000018),
    ("D-R00019", 11000019),
    ("D-R00020", 11000020),
    ("D-R00021", 11000021),
    ("D-R00022", 11000022),
    ("D-R00023", 11000023),
    ("E-R00024", 11000024),
    ("E-R00025", 11000025),
    ("E-R00026", 11000026),
    ("E-R00027", 11000027),
    ("E-R00028", 11000028),
    ("E-R00029", 11000029),
    ("F-R00030", 11000030),
];

/// Resolve a region name, or accept a numeric region id as is.
pub fn resolve_region(region: &str) -> AppResult<String> {
    let region = region.trim();
    if region.parse::<i64>().is_ok() {
        return Ok(region.to_string());
    }

    REGIONS
        .iter()
        .find(|(name, _)| *name == region)
        .map(|(_, id)| id.to_string())
        .ok_or_else(|| AppError::Validation(format!("{} is not a valid region name", region)))
}

/// Seed query for `region` at `saturation` percent (0-100).
pub fn build_query(region: &str, saturation: u8) -> AppResult<String> {
    if saturation > 100 {
        return Err(AppError::Validation(format!(
            "Saturation must be between 0 and 100, got {}",
            saturation
        )));
    }

    let region_id = resolve_region(region)?;
    debug!("Seeding region {} ({})", region, region_id);

    let fraction = format!("{:.2}", f64::from(saturation) / 100.0);
    Ok(SEED_TEMPLATE
        .replacen("SVAL", &fraction, 1)
        .replacen("RVAL", &region_id, 1))
}

/// The seed migration running one query per region. It cannot be reverted.
pub fn seed_migration(queries: Vec<String>) -> Migration {
    Migration::new(SEED_MIGRATION_ID, queries, Vec::new())
}
