// Adapters：對外部系統的具體實作（GraphQL、檔案系統、圖表與 PDF 輸出）

pub mod graphql;
pub mod render;
pub mod storage;
