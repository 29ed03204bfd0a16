use crate::error::ExtractError;
use crate::models::Receipt;
use crate::service::ReceiptExtractor;
use axum::{
    body::Bytes,
    extract::{multipart::MultipartRejection, Json, Multipart, State},
};
use std::sync::Arc;
use std::time::Instant;

/// 上传表单中的文件字段名
pub const RECEIPT_FIELD: &str = "receipt";

/// 健康检查
pub async fn health_check() -> &'static str {
    "OK"
}

/// 小票抽取接口: multipart 上传 -> OCR -> 结构化抽取
pub async fn extract_receipt(
    State(extractor): State<Arc<ReceiptExtractor>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Receipt>, ExtractError> {
    // 不是 multipart 请求时同样视为没有上传文件
    let Ok(mut multipart) = multipart else {
        return Err(ExtractError::MissingFile);
    };

    let image = read_receipt_field(&mut multipart).await?;
    tracing::info!("收到小票上传: {} 字节", image.len());

    let start = Instant::now();
    let receipt = extractor.process(&image).await?;
    tracing::info!(
        "小票处理完成: 商品 {} 条, 总耗时 {}ms",
        receipt.products.len(),
        start.elapsed().as_millis()
    );

    Ok(Json(receipt))
}

/// 读取第一个名为 `receipt` 的文件字段, 内容原样返回
///
/// 没有文件名的同名文本字段不算上传文件, 直接跳过。
async fn read_receipt_field(multipart: &mut Multipart) -> Result<Bytes, ExtractError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ExtractError::Multipart(e.body_text()))?
    {
        if field.name() == Some(RECEIPT_FIELD) && field.file_name().is_some() {
            return field
                .bytes()
                .await
                .map_err(|e| ExtractError::Multipart(e.body_text()));
        }
    }

    Err(ExtractError::MissingFile)
}
