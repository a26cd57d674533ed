// 🎲 Synthetic Generator - deterministic placeholder data, last step of the chain
// Same request parameters → same output, with no external dependency.

use super::FetchRequest;
use crate::area;
use crate::records::{Dataset, RegionRecord, Snapshot, TransactionRecord};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use sha2::{Digest, Sha256};

/// Reference year of the population table
pub const BASE_YEAR: i32 = 2020;

/// Transactions produced per real-estate request
pub const SAMPLE_TRANSACTIONS: usize = 50;

/// Major municipalities with approximate 2020 census populations
pub const BASE_POPULATION: &[(&str, &str, &str, i64)] = &[
    ("01100", "北海道", "札幌市", 1_973_395),
    ("01202", "北海道", "函館市", 251_084),
    ("01203", "北海道", "旭川市", 329_306),
    ("02201", "青森県", "青森市", 275_192),
    ("03201", "岩手県", "盛岡市", 289_731),
    ("04100", "宮城県", "仙台市", 1_096_704),
    ("05201", "秋田県", "秋田市", 307_672),
    ("06201", "山形県", "山形市", 248_252),
    ("07201", "福島県", "福島市", 283_348),
    ("07203", "福島県", "郡山市", 324_272),
    ("07204", "福島県", "いわき市", 332_931),
    ("08201", "茨城県", "水戸市", 270_685),
    ("09201", "栃木県", "宇都宮市", 518_757),
    ("10201", "群馬県", "前橋市", 336_154),
    ("10202", "群馬県", "高崎市", 370_884),
    ("11100", "埼玉県", "さいたま市", 1_324_025),
    ("11201", "埼玉県", "川越市", 354_571),
    ("11202", "埼玉県", "熊谷市", 195_781),
    ("11203", "埼玉県", "川口市", 594_274),
    ("11222", "埼玉県", "越谷市", 341_621),
    ("12100", "千葉県", "千葉市", 974_951),
    ("12203", "千葉県", "市川市", 496_676),
    ("12204", "千葉県", "船橋市", 642_907),
    ("12207", "千葉県", "松戸市", 498_232),
    ("12216", "千葉県", "柏市", 426_468),
    ("13101", "東京都", "千代田区", 66_680),
    ("13102", "東京都", "中央区", 169_179),
    ("13103", "東京都", "港区", 260_486),
    ("13104", "東京都", "新宿区", 349_385),
    ("13105", "東京都", "文京区", 240_069),
    ("13106", "東京都", "台東区", 211_444),
    ("13107", "東京都", "墨田区", 272_085),
    ("13108", "東京都", "江東区", 524_310),
    ("13109", "東京都", "品川区", 422_488),
    ("13110", "東京都", "目黒区", 288_088),
    ("13111", "東京都", "大田区", 748_081),
    ("13112", "東京都", "世田谷区", 943_664),
    ("13113", "東京都", "渋谷区", 243_883),
    ("13114", "東京都", "中野区", 344_880),
    ("13115", "東京都", "杉並区", 591_108),
    ("13116", "東京都", "豊島区", 301_599),
    ("13117", "東京都", "北区", 355_213),
    ("13118", "東京都", "荒川区", 217_475),
    ("13119", "東京都", "板橋区", 584_483),
    ("13120", "東京都", "練馬区", 752_608),
    ("13121", "東京都", "足立区", 695_043),
    ("13122", "東京都", "葛飾区", 453_093),
    ("13123", "東京都", "江戸川区", 697_932),
    ("13201", "東京都", "八王子市", 579_355),
    ("13202", "東京都", "立川市", 184_183),
    ("13203", "東京都", "武蔵野市", 150_149),
    ("13204", "東京都", "三鷹市", 195_391),
    ("13208", "東京都", "調布市", 242_614),
    ("13210", "東京都", "町田市", 432_348),
    ("13215", "東京都", "府中市", 262_790),
    ("13219", "東京都", "西東京市", 207_388),
    ("14100", "神奈川県", "横浜市", 3_748_781),
    ("14130", "神奈川県", "川崎市", 1_538_262),
    ("14150", "神奈川県", "相模原市", 725_493),
    ("14201", "神奈川県", "横須賀市", 389_326),
    ("14204", "神奈川県", "平塚市", 258_206),
    ("14205", "神奈川県", "鎌倉市", 172_710),
    ("14206", "神奈川県", "藤沢市", 436_905),
    ("15100", "新潟県", "新潟市", 789_275),
    ("16201", "富山県", "富山市", 413_938),
    ("17201", "石川県", "金沢市", 463_254),
    ("18201", "福井県", "福井市", 262_328),
    ("19201", "山梨県", "甲府市", 188_405),
    ("20201", "長野県", "長野市", 372_760),
    ("20202", "長野県", "松本市", 241_145),
    ("21201", "岐阜県", "岐阜市", 402_557),
    ("22100", "静岡県", "静岡市", 693_389),
    ("22130", "静岡県", "浜松市", 790_718),
    ("23100", "愛知県", "名古屋市", 2_320_361),
    ("23201", "愛知県", "豊橋市", 371_920),
    ("23202", "愛知県", "岡崎市", 386_999),
    ("23211", "愛知県", "豊田市", 421_487),
    ("24201", "三重県", "津市", 274_552),
    ("24202", "三重県", "四日市市", 311_031),
    ("25201", "滋賀県", "大津市", 345_070),
    ("26100", "京都府", "京都市", 1_463_723),
    ("27100", "大阪府", "大阪市", 2_752_412),
    ("27140", "大阪府", "堺市", 826_161),
    ("27202", "大阪府", "岸和田市", 189_988),
    ("27203", "大阪府", "豊中市", 401_558),
    ("27204", "大阪府", "池田市", 104_143),
    ("27205", "大阪府", "吹田市", 385_987),
    ("27207", "大阪府", "高槻市", 351_686),
    ("27210", "大阪府", "枚方市", 401_090),
    ("27212", "大阪府", "八尾市", 264_034),
    ("27227", "大阪府", "東大阪市", 496_681),
    ("28100", "兵庫県", "神戸市", 1_525_152),
    ("28201", "兵庫県", "姫路市", 530_495),
    ("28202", "兵庫県", "尼崎市", 452_563),
    ("28203", "兵庫県", "明石市", 303_601),
    ("28204", "兵庫県", "西宮市", 485_587),
    ("29201", "奈良県", "奈良市", 354_630),
    ("30201", "和歌山県", "和歌山市", 356_729),
    ("31201", "鳥取県", "鳥取市", 188_465),
    ("32201", "島根県", "松江市", 203_616),
    ("33100", "岡山県", "岡山市", 724_691),
    ("33202", "岡山県", "倉敷市", 477_118),
    ("34100", "広島県", "広島市", 1_200_754),
    ("34202", "広島県", "呉市", 214_592),
    ("34207", "広島県", "福山市", 460_709),
    ("35201", "山口県", "下関市", 255_051),
    ("35203", "山口県", "山口市", 194_910),
    ("36201", "徳島県", "徳島市", 252_391),
    ("37201", "香川県", "高松市", 420_748),
    ("38201", "愛媛県", "松山市", 511_192),
    ("39201", "高知県", "高知市", 326_545),
    ("40100", "福岡県", "北九州市", 939_029),
    ("40130", "福岡県", "福岡市", 1_612_392),
    ("40202", "福岡県", "大牟田市", 111_281),
    ("40203", "福岡県", "久留米市", 303_316),
    ("41201", "佐賀県", "佐賀市", 233_301),
    ("42201", "長崎県", "長崎市", 409_118),
    ("42202", "長崎県", "佐世保市", 243_223),
    ("43100", "熊本県", "熊本市", 738_865),
    ("44201", "大分県", "大分市", 478_146),
    ("45201", "宮崎県", "宮崎市", 401_339),
    ("46201", "鹿児島県", "鹿児島市", 593_128),
    ("47201", "沖縄県", "那覇市", 317_625),
];

const STRUCTURES: [&str; 4] = ["RC", "SRC", "木造", "鉄骨造"];
const USES: [&str; 4] = ["住宅", "店舗", "事務所", "共同住宅"];
const CITY_PLANNING: [&str; 3] = ["商業地域", "住居地域", "工業地域"];

/// Unit price (yen/㎡) around which a prefecture's samples are drawn
fn base_unit_price(pref_code: &str) -> f64 {
    match pref_code {
        "13" => 800_000.0,
        "14" => 400_000.0,
        "27" => 350_000.0,
        "23" => 250_000.0,
        "01" => 100_000.0,
        _ => 200_000.0,
    }
}

/// SyntheticGenerator - stateless; every call reseeds from the request
#[derive(Debug, Clone, Copy, Default)]
pub struct SyntheticGenerator;

impl SyntheticGenerator {
    pub fn new() -> Self {
        SyntheticGenerator
    }

    pub fn generate(&self, request: &FetchRequest) -> Snapshot {
        let mut rng = seeded_rng(request);
        match request.dataset {
            Dataset::Population => Snapshot::Regions(population(request.year, &mut rng)),
            Dataset::RealEstate => Snapshot::Transactions(transactions(request, &mut rng)),
        }
    }
}

/// SHA-256 of the request fingerprint, first 8 bytes as the seed
fn seeded_rng(request: &FetchRequest) -> StdRng {
    let digest = Sha256::digest(request.fingerprint().as_bytes());
    let mut seed = [0u8; 8];
    seed.copy_from_slice(&digest[..8]);
    StdRng::seed_from_u64(u64::from_le_bytes(seed))
}

/// About 2 % change per 5-year census step away from the base year, plus ±1 % jitter
fn population(year: i32, rng: &mut StdRng) -> Vec<RegionRecord> {
    let steps = (year - BASE_YEAR).div_euclid(5);
    let year_factor = 1.0 - 0.02 * steps as f64;

    BASE_POPULATION
        .iter()
        .map(|(code, pref, muni, base)| {
            let jitter: f64 = rng.gen_range(-0.01..=0.01);
            let value = (*base as f64 * year_factor * (1.0 + jitter)) as i64;
            RegionRecord::new(code, pref, muni, year, value)
        })
        .collect()
}

fn transactions(request: &FetchRequest, rng: &mut StdRng) -> Vec<TransactionRecord> {
    let year = request.year;
    let pref_code = request.scope.prefecture.as_deref().unwrap_or("13");
    let prefecture = area::prefecture_name(pref_code).unwrap_or("東京都");
    let municipality = request
        .scope
        .region
        .as_deref()
        .and_then(|code| BASE_POPULATION.iter().find(|(c, _, _, _)| *c == code))
        .map(|(_, _, muni, _)| *muni)
        .unwrap_or("サンプル市");

    let year_factor = 1.0 + (year - 2015) as f64 * 0.03;
    let base = base_unit_price(pref_code) * year_factor;

    (0..SAMPLE_TRANSACTIONS)
        .map(|i| {
            let area: f64 = rng.gen_range(50.0..200.0);
            let area = (area * 100.0).round() / 100.0;
            let unit_price = (base * rng.gen_range(0.7..1.5)) as i64;
            let trade_price = (unit_price as f64 * area) as i64;
            let quarter = rng.gen_range(1..=4);
            let built = rng.gen_range(1990..=year.max(1990));

            let mut tx = TransactionRecord::new(prefecture, municipality)
                .with_prices(Some(trade_price), Some(unit_price), Some(area))
                .with_district(Some(format!("サンプル地区{}", i % 5 + 1)))
                .with_trade_period(Some(format!("{}年第{}四半期", year, quarter)));

            tx.building_year = Some(built.to_string());
            tx.structure = STRUCTURES.choose(rng).map(|s| s.to_string());
            tx.use_type = USES.choose(rng).map(|s| s.to_string());
            tx.city_planning = CITY_PLANNING.choose(rng).map(|s| s.to_string());
            tx.price_classification = Some("取引価格".to_string());
            tx
        })
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_request_same_output() {
        let generator = SyntheticGenerator::new();
        let req = FetchRequest::realestate(2020, "13", Some("13101"));
        assert_eq!(generator.generate(&req), generator.generate(&req));

        let req = FetchRequest::population(2015);
        assert_eq!(generator.generate(&req), generator.generate(&req));
    }

    #[test]
    fn test_different_parameters_differ() {
        let generator = SyntheticGenerator::new();
        let a = generator.generate(&FetchRequest::realestate(2020, "13", Some("13101")));
        let b = generator.generate(&FetchRequest::realestate(2020, "13", Some("13102")));
        assert_ne!(a, b);
    }

    #[test]
    fn test_population_table_is_consistent() {
        for (code, pref, _, _) in BASE_POPULATION {
            assert_eq!(area::resolve(code).prefecture_name, *pref);
        }

        let snapshot = SyntheticGenerator::new().generate(&FetchRequest::population(2020));
        let regions = snapshot.regions().unwrap();
        assert_eq!(regions.len(), BASE_POPULATION.len());
        let chiyoda = regions.iter().find(|r| r.code == "13101").unwrap();
        assert!((66_013..=67_347).contains(&chiyoda.value));
        assert_eq!(chiyoda.year, 2020);
    }

    #[test]
    fn test_population_table_covers_core_cities() {
        let mut codes: Vec<&str> = BASE_POPULATION.iter().map(|(c, _, _, _)| *c).collect();
        assert!(codes.windows(2).all(|w| w[0] < w[1]));
        codes.dedup();
        assert_eq!(codes.len(), BASE_POPULATION.len());

        for code in ["01202", "13201", "28201", "47201"] {
            assert!(codes.contains(&code), "{code} missing");
        }

        let snapshot =
            SyntheticGenerator::new().generate(&FetchRequest::realestate(2020, "13", Some("13201")));
        assert_eq!(snapshot.transactions().unwrap()[0].municipality, "八王子市");
    }

    #[test]
    fn test_population_scales_with_year() {
        let generator = SyntheticGenerator::new();
        let value = |year| {
            generator
                .generate(&FetchRequest::population(year))
                .into_regions()
                .into_iter()
                .find(|r| r.code == "14100")
                .map(|r| r.value)
                .unwrap()
        };
        // 2000 is four steps back: factor 1.08
        assert!(value(2000) > value(2020));
    }

    #[test]
    fn test_transactions_shape() {
        let snapshot =
            SyntheticGenerator::new().generate(&FetchRequest::realestate(2020, "27", Some("27100")));
        let txs = snapshot.transactions().unwrap();
        assert_eq!(txs.len(), SAMPLE_TRANSACTIONS);

        let base = 350_000.0 * 1.15;
        for tx in txs {
            assert_eq!(tx.prefecture, "大阪府");
            assert_eq!(tx.municipality, "大阪市");
            let unit = tx.unit_price.unwrap() as f64;
            assert!(unit >= base * 0.7 - 1.0 && unit <= base * 1.5);
            let area = tx.area.unwrap();
            assert!((50.0..=200.0).contains(&area));
            assert!(tx.trade_period.as_deref().unwrap().starts_with("2020年第"));
        }
    }

    #[test]
    fn test_unknown_city_is_sample_municipality() {
        let snapshot =
            SyntheticGenerator::new().generate(&FetchRequest::realestate(2018, "32", Some("32203")));
        let tx = &snapshot.transactions().unwrap()[0];
        assert_eq!(tx.prefecture, "島根県");
        assert_eq!(tx.municipality, "サンプル市");
    }
}
