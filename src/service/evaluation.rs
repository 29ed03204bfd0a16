//! 抽取结果与人工标注的比对
//!
//! OCR 文本本身有噪声, 所以自由文本字段按相似度比对, 数值、单位和序号
//! 必须精确一致。阈值是验收标准的一部分。

use crate::models::parse_receipt_datetime;
use chrono::NaiveDate;
use serde_json::Value;
use strsim::normalized_levenshtein;
use thiserror::Error;

/// 商户名称、地址、商品描述
pub const FREE_TEXT_THRESHOLD: f64 = 50.0;
/// SKU 允许一个字符左右的识别误差
pub const SKU_THRESHOLD: f64 = 90.0;
/// 逐行匹配成功的商品占比必须超过该值
pub const PRODUCT_MATCH_RATIO: f64 = 0.8;

const REQUIRED_KEYS: [&str; 3] = ["receipt_datetime", "store", "products"];
const EXACT_PRODUCT_KEYS: [&str; 5] = ["unit_price", "quantity", "total_price", "quantity_measure", "idx"];

/// 第一个不满足的检查项
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Mismatch {
    #[error("Data types are not objects")]
    NotAnObject,

    #[error("Missing required keys in expected data: {0:?}")]
    MissingKeys(Vec<String>),

    #[error("Invalid date format: expected {expected}, actual {actual}")]
    InvalidDate { expected: String, actual: String },

    #[error("Date mismatch: expected {expected}, got {actual}")]
    Date { expected: NaiveDate, actual: NaiveDate },

    #[error("{field} mismatch: expected {expected}, got {actual}")]
    Field {
        field: String,
        expected: String,
        actual: String,
    },

    #[error("Store mismatch: {0}")]
    Store(Box<Mismatch>),

    #[error("Products do not match by {threshold:.0}% threshold ({matched}/{total} matched)")]
    Products {
        matched: usize,
        total: usize,
        threshold: f64,
    },
}

/// 编辑距离相似度, 0-100
pub fn similarity(a: &str, b: &str) -> f64 {
    normalized_levenshtein(a, b) * 100.0
}

pub fn is_similar(a: &str, b: &str, threshold: f64) -> bool {
    similarity(a, b) >= threshold
}

fn text<'a>(value: &'a Value, key: &str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or_default()
}

fn display(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(v) => v.to_string(),
        None => "null".to_string(),
    }
}

/// 数字按数值比较, 2 与 2.0 视为相等
fn same_value(a: Option<&Value>, b: Option<&Value>) -> bool {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn field_mismatch(field: &str, expected: Option<&Value>, actual: Option<&Value>) -> Mismatch {
    Mismatch::Field {
        field: field.to_string(),
        expected: display(expected),
        actual: display(actual),
    }
}

/// 商户: 税号精确一致, 名称和地址模糊匹配
pub fn check_store(expected: &Value, actual: &Value) -> Result<(), Mismatch> {
    if !same_value(expected.get("cnpj"), actual.get("cnpj")) {
        return Err(field_mismatch("cnpj", expected.get("cnpj"), actual.get("cnpj")));
    }

    for key in ["name", "address"] {
        if !is_similar(text(expected, key), text(actual, key), FREE_TEXT_THRESHOLD) {
            return Err(field_mismatch(key, expected.get(key), actual.get(key)));
        }
    }

    Ok(())
}

/// 单个商品行
pub fn check_product(expected: &Value, actual: &Value) -> Result<(), Mismatch> {
    if !is_similar(text(expected, "sku"), text(actual, "sku"), SKU_THRESHOLD) {
        return Err(field_mismatch("sku", expected.get("sku"), actual.get("sku")));
    }

    for key in EXACT_PRODUCT_KEYS {
        if !same_value(expected.get(key), actual.get(key)) {
            return Err(field_mismatch(key, expected.get(key), actual.get(key)));
        }
    }

    if !is_similar(
        text(expected, "description"),
        text(actual, "description"),
        FREE_TEXT_THRESHOLD,
    ) {
        return Err(field_mismatch(
            "description",
            expected.get("description"),
            actual.get("description"),
        ));
    }

    Ok(())
}

/// 按位置配对后逐行比较, 返回匹配成功的行数
///
/// 实际结果多出或缺少的行不参与配对, 缺少的行计为失败。
pub fn count_matching_products(expected: &[Value], actual: &[Value]) -> usize {
    expected
        .iter()
        .zip(actual)
        .filter(|(e, a)| match check_product(e, a) {
            Ok(()) => true,
            Err(mismatch) => {
                tracing::info!("Product mismatch: {}", mismatch);
                false
            }
        })
        .count()
}

pub fn check_products(expected: &[Value], actual: &[Value]) -> Result<(), Mismatch> {
    let total = expected.len();
    // 没有标注商品时无从比较
    if total == 0 {
        return Ok(());
    }

    let matched = count_matching_products(expected, actual);
    if matched as f64 / total as f64 > PRODUCT_MATCH_RATIO {
        Ok(())
    } else {
        Err(Mismatch::Products {
            matched,
            total,
            threshold: PRODUCT_MATCH_RATIO * 100.0,
        })
    }
}

/// 只比较日期部分
pub fn compare_dates(expected: &str, actual: &str) -> Result<(), Mismatch> {
    let (Some(e), Some(a)) = (parse_receipt_datetime(expected), parse_receipt_datetime(actual)) else {
        return Err(Mismatch::InvalidDate {
            expected: expected.to_string(),
            actual: actual.to_string(),
        });
    };

    if e.date() != a.date() {
        return Err(Mismatch::Date {
            expected: e.date(),
            actual: a.date(),
        });
    }

    Ok(())
}

/// 整体比对: 日期 -> 商户 -> 商品
pub fn compare_parsed_data(expected: &Value, actual: &Value) -> Result<(), Mismatch> {
    if !expected.is_object() || !actual.is_object() {
        return Err(Mismatch::NotAnObject);
    }

    let missing: Vec<String> = REQUIRED_KEYS
        .iter()
        .filter(|k| expected.get(**k).is_none())
        .map(|k| k.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(Mismatch::MissingKeys(missing));
    }

    compare_dates(text(expected, "receipt_datetime"), text(actual, "receipt_datetime"))?;

    let empty = Value::Null;
    check_store(&expected["store"], actual.get("store").unwrap_or(&empty))
        .map_err(|e| Mismatch::Store(Box::new(e)))?;

    let products = |v: &Value| -> Vec<Value> {
        v.get("products")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default()
    };
    check_products(&products(expected), &products(actual))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn product(idx: i64, sku: &str, description: &str, qty: f64, unit_price: f64) -> Value {
        json!({
            "idx": idx,
            "sku": sku,
            "description": description,
            "quantity": qty,
            "quantity_measure": "UN",
            "unit_price": unit_price,
            "total_price": (qty * unit_price * 100.0).round() / 100.0
        })
    }

    fn receipt(products: Vec<Value>) -> Value {
        json!({
            "store": {
                "name": "SUPERMERCADO BOM PRECO LTDA",
                "cnpj": "12.345.678/0001-90",
                "address": "RUA DAS FLORES, 100 - CENTRO - SAO PAULO"
            },
            "products": products,
            "receipt_datetime": "2024-03-15T18:42:07"
        })
    }

    fn ten_products() -> Vec<Value> {
        (1..=10)
            .map(|i| product(i, &format!("789100010{:04}", i), &format!("PRODUTO NUMERO {}", i), 1.0, 2.5 * i as f64))
            .collect()
    }

    #[test]
    fn similarity_scale() {
        assert_eq!(similarity("ARROZ", "ARROZ"), 100.0);
        assert_eq!(similarity("", ""), 100.0);
        assert_eq!(similarity("ABCD", "WXYZ"), 0.0);
        // 13 位 SKU 错一位仍然通过
        assert!(is_similar("7891000100103", "7891000100108", SKU_THRESHOLD));
        assert!(!is_similar("7891000100103", "7891000199999", SKU_THRESHOLD));
    }

    #[test]
    fn identical_receipts_match() {
        let expected = receipt(ten_products());
        assert_eq!(compare_parsed_data(&expected, &expected.clone()), Ok(()));
    }

    #[test]
    fn time_of_day_is_ignored() {
        let expected = receipt(ten_products());
        let mut actual = expected.clone();
        actual["receipt_datetime"] = json!("2024-03-15T09:00:00");
        assert_eq!(compare_parsed_data(&expected, &actual), Ok(()));

        actual["receipt_datetime"] = json!("2024-03-16T18:42:07");
        assert!(matches!(
            compare_parsed_data(&expected, &actual),
            Err(Mismatch::Date { .. })
        ));

        actual["receipt_datetime"] = json!("15/03/2024");
        assert!(matches!(
            compare_parsed_data(&expected, &actual),
            Err(Mismatch::InvalidDate { .. })
        ));
    }

    #[test]
    fn store_tax_id_must_be_exact() {
        let expected = receipt(ten_products());
        let mut actual = expected.clone();
        actual["store"]["cnpj"] = json!("12.345.678/0001-91");

        let err = compare_parsed_data(&expected, &actual).unwrap_err();
        assert!(err.to_string().starts_with("Store mismatch: cnpj mismatch"), "{err}");
    }

    #[test]
    fn store_name_tolerates_ocr_noise() {
        let expected = receipt(ten_products());
        let mut actual = expected.clone();
        actual["store"]["name"] = json!("SUPERMERCAD0 BOM PREC0 LTD");
        assert_eq!(check_store(&expected["store"], &actual["store"]), Ok(()));

        actual["store"]["address"] = json!("AV PAULISTA 2000");
        assert!(check_store(&expected["store"], &actual["store"]).is_err());
    }

    #[test]
    fn product_numeric_fields_are_exact() {
        let expected = product(3, "7891000100103", "LEITE COND MOCA 395G", 2.0, 6.49);

        let mut actual = expected.clone();
        actual["unit_price"] = json!(6.5);
        let err = check_product(&expected, &actual).unwrap_err();
        assert!(err.to_string().starts_with("unit_price mismatch"));

        let mut actual = expected.clone();
        actual["quantity_measure"] = json!("KG");
        assert!(check_product(&expected, &actual).is_err());

        // 整数与浮点表示等价
        let mut actual = expected.clone();
        actual["idx"] = json!(3.0);
        assert_eq!(check_product(&expected, &actual), Ok(()));
    }

    #[test]
    fn product_description_is_fuzzy() {
        let expected = product(1, "7891000100103", "LEITE COND MOCA 395G", 1.0, 6.49);
        let mut actual = expected.clone();
        actual["description"] = json!("LEITE CONO MOCA 395");
        assert_eq!(check_product(&expected, &actual), Ok(()));

        actual["description"] = json!("SABAO EM PO");
        assert!(check_product(&expected, &actual).is_err());
    }

    #[test]
    fn aggregate_threshold_is_strictly_above_80_percent() {
        let expected = ten_products();

        // 9/10 通过
        let mut actual = expected.clone();
        actual[0]["total_price"] = json!(999.0);
        assert_eq!(count_matching_products(&expected, &actual), 9);
        assert_eq!(check_products(&expected, &actual), Ok(()));

        // 8/10 正好 80%, 不通过
        actual[1]["total_price"] = json!(999.0);
        assert_eq!(
            check_products(&expected, &actual),
            Err(Mismatch::Products { matched: 8, total: 10, threshold: 80.0 })
        );
    }

    #[test]
    fn missing_actual_products_count_as_failures() {
        let expected = ten_products();
        let actual = expected[..9].to_vec();
        assert_eq!(check_products(&expected, &actual), Ok(()));

        let actual = expected[..8].to_vec();
        assert!(check_products(&expected, &actual).is_err());
    }

    #[test]
    fn expected_fixture_must_have_required_keys() {
        let mut expected = receipt(ten_products());
        expected.as_object_mut().unwrap().remove("store");
        let actual = receipt(ten_products());

        assert_eq!(
            compare_parsed_data(&expected, &actual),
            Err(Mismatch::MissingKeys(vec!["store".to_string()]))
        );
        assert_eq!(
            compare_parsed_data(&json!("not an object"), &actual),
            Err(Mismatch::NotAnObject)
        );
    }
}
