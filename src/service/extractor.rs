use crate::client::{build_http_client, DocumentAiClient, OpenAiClient};
use crate::config::AppConfig;
use crate::error::ExtractError;
use crate::models::Receipt;
use std::time::Instant;

/// 结构化抽取的系统提示词
pub const RECEIPT_SYSTEM_PROMPT: &str = "You are an expert at structured data extraction. \
You will be given unstructured text from a supermarket receipt and should convert it into the given structure. \
The receipt has two rows per product: the first row contains the number of the item on the list, the sku and the description; \
the second row contains the quantity, quantity measurement, unit price, tare and total price. \
Parse the datetime in yyyy-mm-ddTHH:mm:ss format to determine the date and time.";

/// 上传的小票按 JPEG 处理
pub const RECEIPT_MIME_TYPE: &str = "image/jpeg";

/// 小票抽取服务: OCR -> 结构化抽取, 无状态
pub struct ReceiptExtractor {
    ocr: DocumentAiClient,
    llm: OpenAiClient,
}

impl ReceiptExtractor {
    pub fn new(ocr: DocumentAiClient, llm: OpenAiClient) -> Self {
        Self { ocr, llm }
    }

    /// 按配置创建两个上游客户端, 共用一个 HTTP 客户端
    pub fn from_config(config: &AppConfig) -> Result<Self, ExtractError> {
        let http = build_http_client()?;
        let ocr = DocumentAiClient::new(http.clone(), &config.ocr)?;
        let llm = OpenAiClient::new(http, &config.llm);
        Ok(Self::new(ocr, llm))
    }

    /// 第一步: 图片 -> 全文
    pub async fn extract_text(&self, image: &[u8]) -> Result<String, ExtractError> {
        let start = Instant::now();
        let text = self.ocr.process_document(image, RECEIPT_MIME_TYPE).await?;
        tracing::info!(
            "OCR 完成: processor={}, 图片 {} 字节, 文本 {} 字符, 耗时 {}ms",
            self.ocr.processor_name(),
            image.len(),
            text.chars().count(),
            start.elapsed().as_millis()
        );
        Ok(text)
    }

    /// 第二步: 全文 -> Receipt
    pub async fn extract_receipt(&self, text: &str) -> Result<Receipt, ExtractError> {
        let start = Instant::now();
        let receipt: Receipt = self.llm.parse(RECEIPT_SYSTEM_PROMPT, text).await?;
        tracing::info!(
            "结构化抽取完成: model={}, 商品 {} 条, 耗时 {}ms",
            self.llm.model(),
            receipt.products.len(),
            start.elapsed().as_millis()
        );
        Ok(receipt)
    }

    /// 完整流程, 两次调用严格串行
    pub async fn process(&self, image: &[u8]) -> Result<Receipt, ExtractError> {
        let text = self.extract_text(image).await?;
        self.extract_receipt(&text).await
    }
}
