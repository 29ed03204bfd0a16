use chrono::{DateTime, NaiveDate, NaiveDateTime};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// 数量单位: 件 / 公斤
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum QuantityMeasure {
    #[serde(rename = "UN")]
    Unit,
    #[serde(rename = "KG")]
    Kilogram,
}

/// 小票商品行
///
/// `total_price` 通常约等于 `quantity * unit_price`, 这里不做校验。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Product {
    pub idx: i64,              // 小票上的序号, 从 1 开始
    pub sku: String,
    pub description: String,
    pub quantity: f64,
    pub quantity_measure: QuantityMeasure,
    pub unit_price: f64,
    pub total_price: f64,
}

/// 商户信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Store {
    pub name: String,
    pub cnpj: String,          // 税号, 下游要求精确匹配
    pub address: String,
}

/// 结构化小票
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Receipt {
    pub store: Store,
    pub products: Vec<Product>,
    /// yyyy-mm-ddTHH:mm:ss
    pub receipt_datetime: String,
}

impl Receipt {
    pub fn datetime(&self) -> Option<NaiveDateTime> {
        parse_receipt_datetime(&self.receipt_datetime)
    }
}

/// 解析 ISO-8601 时间, 兼容空格分隔、省略秒、只有日期以及带时区偏移的写法
///
/// 带偏移 (`Z` / `-03:00`) 时取小票上的本地时间, 不换算到 UTC。
pub fn parse_receipt_datetime(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    const FORMATS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ];

    FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| DateTime::parse_from_rfc3339(value).ok().map(|dt| dt.naive_local()))
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> serde_json::Value {
        json!({
            "store": {
                "name": "SUPERMERCADO BOM PRECO LTDA",
                "cnpj": "12.345.678/0001-90",
                "address": "RUA DAS FLORES, 100 - CENTRO"
            },
            "products": [
                {
                    "idx": 1,
                    "sku": "7891000100103",
                    "description": "LEITE COND MOCA 395G",
                    "quantity": 2.0,
                    "quantity_measure": "UN",
                    "unit_price": 6.49,
                    "total_price": 12.98
                },
                {
                    "idx": 2,
                    "sku": "2000123",
                    "description": "BANANA PRATA KG",
                    "quantity": 1.235,
                    "quantity_measure": "KG",
                    "unit_price": 5.99,
                    "total_price": 7.40
                }
            ],
            "receipt_datetime": "2024-03-15T18:42:07"
        })
    }

    #[test]
    fn parses_wire_format() {
        let receipt: Receipt = serde_json::from_value(sample()).unwrap();

        assert_eq!(receipt.products.len(), 2);
        assert_eq!(receipt.products[0].quantity_measure, QuantityMeasure::Unit);
        assert_eq!(receipt.products[1].quantity_measure, QuantityMeasure::Kilogram);
        assert_eq!(receipt.store.cnpj, "12.345.678/0001-90");
        assert_eq!(
            receipt.datetime().unwrap().to_string(),
            "2024-03-15 18:42:07"
        );

        // 序列化后字段名保持不变
        let back = serde_json::to_value(&receipt).unwrap();
        assert_eq!(back["products"][1]["quantity_measure"], "KG");
        assert_eq!(back["receipt_datetime"], "2024-03-15T18:42:07");
    }

    #[test]
    fn rejects_unknown_measure_and_extra_fields() {
        let mut value = sample();
        value["products"][0]["quantity_measure"] = json!("LT");
        assert!(serde_json::from_value::<Receipt>(value).is_err());

        let mut value = sample();
        value["store"]["phone"] = json!("555-0100");
        assert!(serde_json::from_value::<Receipt>(value).is_err());
    }

    #[test]
    fn datetime_variants() {
        assert!(parse_receipt_datetime("2024-03-15 18:42:07").is_some());
        assert!(parse_receipt_datetime("2024-03-15T18:42:07.250").is_some());
        assert!(parse_receipt_datetime("2024-03-15T18:42").is_some());
        assert_eq!(
            parse_receipt_datetime("2024-03-15").unwrap().date(),
            NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
        );
        assert!(parse_receipt_datetime("15/03/2024 18:42").is_none());

        // 带时区偏移: 保留本地时间
        let with_offset = parse_receipt_datetime("2024-03-15T23:42:07-03:00").unwrap();
        assert_eq!(with_offset.to_string(), "2024-03-15 23:42:07");
        let utc = parse_receipt_datetime("2024-03-15T18:42:07Z").unwrap();
        assert_eq!(utc.date(), NaiveDate::from_ymd_opt(2024, 3, 15).unwrap());
    }
}
