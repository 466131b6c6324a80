// 分享列表客户端
//
// provider 的列表接口没有文档且经常变动，这里同时实现两种请求策略：
// GET 策略走 dm 域的读优化端点，POST 策略按分享域名选择表单端点。
// 固定顺序：GET 优先，失败或无可用列表时回退 POST。

use crate::provider::surl::{extract_surl, ShareReference};
use crate::provider::types::{ShareError, ShareListResponse, ShareListing};
use anyhow::{Context, Result};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info, warn};

/// 浏览器 User-Agent（与网页端一致，避免被风控拦截）
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// GET 列表端点（dm 域）
const GET_LIST_ENDPOINT: &str = "https://dm.terabox.app/share/list";
const GET_LIST_ORIGIN: &str = "https://dm.terabox.app";

/// POST 列表端点按分享域名模式选择；未匹配时使用兜底端点
///
/// 新增域名族只需在表里加一行，调用点不变
const POST_LIST_ENDPOINTS: &[(&str, &str)] = &[
    ("1024tera.com", "https://www.1024tera.com/share/list"),
    ("terabox.app", "https://www.terabox.app/share/list"),
    ("terabox.com", "https://www.terabox.com/share/list"),
];
const POST_LIST_FALLBACK: &str = "https://www.terabox.app/share/list";

/// 固定应用参数
const APP_ID: &str = "250528";

/// 单目录自动下钻的最大深度（GET 与 POST 两条路径共用，防止
/// 病态嵌套分享导致的无限下钻）
pub const MAX_FOLDER_DEPTH: usize = 3;

/// 分享列表客户端
#[derive(Debug, Clone)]
pub struct ShareListingClient {
    /// HTTP客户端
    client: Client,
}

impl ShareListingClient {
    /// 创建新的分享列表客户端
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .timeout(Duration::from_secs(60))
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }

    /// 按分享域名选择 POST 列表端点
    pub fn pick_post_endpoint(hostname: &str) -> &'static str {
        let host = hostname.to_ascii_lowercase();
        POST_LIST_ENDPOINTS
            .iter()
            .find(|(pattern, _)| host.contains(pattern))
            .map(|(_, endpoint)| *endpoint)
            .unwrap_or(POST_LIST_FALLBACK)
    }

    /// 跟随重定向，返回最终 URL（短链会 302 到 sharing/link 页面）
    pub async fn resolve_final_url(&self, url: &str) -> Result<String, ShareError> {
        let resp = self
            .client
            .get(url)
            .header("Accept", "application/json, text/plain, */*")
            .header("Accept-Language", "en-US,en;q=0.9")
            .send()
            .await
            .map_err(|e| ShareError::Network(e.to_string()))?;

        Ok(resp.url().to_string())
    }

    /// 解析分享链接并返回完整文件列表
    ///
    /// 1. 跟随重定向取最终 URL，surl 优先从最终 URL 提取
    /// 2. GET 策略优先；结果为单个目录时按路径有界下钻
    /// 3. GET 不可用时回退 POST 策略，按目录 fs_id 有界下钻
    ///
    /// 两种策略都失败时返回终止性的 ListingFailed，不做自动重试
    pub async fn list_share(&self, source_url: &str, cookie: &str) -> Result<ShareListing, ShareError> {
        let final_url = self.resolve_final_url(source_url).await?;
        debug!("分享链接最终 URL: {}", final_url);

        let surl = extract_surl(&final_url)
            .or_else(|| extract_surl(source_url))
            .ok_or(ShareError::NoSurlFound)?;

        let share = ShareReference {
            surl,
            source_url: final_url,
        };

        match self.try_get_strategy(&share, cookie).await {
            Ok(Some(listing)) => return Ok(listing),
            Ok(None) => info!("GET 列表策略无可用结果，回退 POST 策略"),
            Err(e) => warn!("GET 列表策略失败，回退 POST 策略: {}", e),
        }

        match self.try_post_strategy(&share).await {
            Ok(Some(listing)) => Ok(listing),
            Ok(None) => Err(ShareError::ListingFailed(
                "两种列表策略均未取得内容".to_string(),
            )),
            Err(e) => Err(ShareError::ListingFailed(e.to_string())),
        }
    }

    /// GET 策略：读优化端点，页大小 100，按名称升序
    ///
    /// dir 为空时取根目录（root=1），否则按路径下钻
    async fn fetch_list_get(
        &self,
        surl: &str,
        dir: &str,
        cookie: &str,
    ) -> Result<ShareListResponse, ShareError> {
        let mut params: Vec<(&str, &str)> = vec![
            ("app_id", APP_ID),
            ("web", "1"),
            ("channel", "dubox"),
            ("clienttype", "0"),
            ("shorturl", surl),
            ("page", "1"),
            ("num", "100"),
            ("order", "asc"),
            ("by", "name"),
        ];
        if dir.is_empty() || dir == "/" {
            params.push(("root", "1"));
        } else {
            params.push(("dir", dir));
        }

        let mut request = self
            .client
            .get(GET_LIST_ENDPOINT)
            .query(&params)
            .header("Accept", "application/json, text/plain, */*")
            .header("Accept-Language", "en-US,en;q=0.9")
            .header("X-Requested-With", "XMLHttpRequest")
            .header("Referer", format!("{}/", GET_LIST_ORIGIN))
            .header("Origin", GET_LIST_ORIGIN);
        if !cookie.is_empty() {
            request = request.header("Cookie", cookie);
        }

        let resp = request
            .send()
            .await
            .map_err(|e| ShareError::Network(e.to_string()))?;

        resp.json::<ShareListResponse>()
            .await
            .map_err(|e| ShareError::Network(e.to_string()))
    }

    /// POST 策略：表单编码端点，按域名表选择
    ///
    /// folder_fs_id 存在时按目录内部 id 下钻（替换 root=1）
    async fn fetch_list_post(
        &self,
        api_url: &str,
        surl: &str,
        referer: &str,
        folder_fs_id: Option<&str>,
    ) -> Result<ShareListResponse, ShareError> {
        let mut form: Vec<(&str, &str)> = vec![
            ("app_id", APP_ID),
            ("web", "1"),
            ("channel", "0"),
            ("clienttype", "0"),
            ("shorturl", surl),
        ];
        match folder_fs_id {
            Some(fs_id) => form.push(("fs_id", fs_id)),
            None => form.push(("root", "1")),
        }

        let origin = referer.split("/sharing/").next().unwrap_or(referer);

        let resp = self
            .client
            .post(api_url)
            .form(&form)
            .header("Accept", "application/json, text/plain, */*")
            .header("Accept-Language", "en-US,en;q=0.9")
            .header("X-Requested-With", "XMLHttpRequest")
            .header("Referer", referer)
            .header("Origin", origin)
            .send()
            .await
            .map_err(|e| ShareError::Network(e.to_string()))?;

        resp.json::<ShareListResponse>()
            .await
            .map_err(|e| ShareError::Network(e.to_string()))
    }

    /// GET 策略全流程；返回 None 表示应回退 POST
    async fn try_get_strategy(
        &self,
        share: &ShareReference,
        cookie: &str,
    ) -> Result<Option<ShareListing>, ShareError> {
        let root = self.fetch_list_get(&share.surl, "", cookie).await?;
        if !root.is_success() {
            debug!("GET 列表返回 errno={}: {}", root.errno, root.errmsg);
            return Ok(None);
        }

        let mut title = root.title;
        let share_username = root.share_username;
        let mut list = root.list;

        // 单目录结果按路径下钻，保留目录名作为容器标题
        let mut depth = 0;
        while depth < MAX_FOLDER_DEPTH && list.len() == 1 && list[0].is_directory() {
            let folder = list.remove(0);
            info!("分享根为单个目录，下钻: {}", folder.server_filename);

            let inner = match self.fetch_list_get(&share.surl, &folder.path, cookie).await {
                Ok(resp) if resp.is_success() => resp,
                Ok(resp) => {
                    warn!("目录下钻返回 errno={}，回退 POST 策略", resp.errno);
                    return Ok(None);
                }
                Err(e) => {
                    warn!("目录下钻失败，回退 POST 策略: {}", e);
                    return Ok(None);
                }
            };

            title = Some(folder.server_filename);
            list = inner.list;
            depth += 1;
        }

        Ok(Some(ShareListing {
            share: share.clone(),
            title,
            share_username,
            files: list,
        }))
    }

    /// POST 策略全流程；返回 None 表示该策略也未取得列表
    async fn try_post_strategy(
        &self,
        share: &ShareReference,
    ) -> Result<Option<ShareListing>, ShareError> {
        let hostname = reqwest::Url::parse(&share.source_url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_default();
        let api_url = Self::pick_post_endpoint(&hostname);
        debug!("POST 列表端点: {} (host={})", api_url, hostname);

        let root = self
            .fetch_list_post(api_url, &share.surl, &share.source_url, None)
            .await?;
        if !root.is_success() {
            debug!("POST 列表返回 errno={}: {}", root.errno, root.errmsg);
            return Ok(None);
        }

        let mut title = root.title;
        let share_username = root.share_username;
        let mut list = root.list;

        // 单目录结果按 fs_id 下钻；下钻失败时以当前列表为准
        let mut depth = 0;
        while depth < MAX_FOLDER_DEPTH && list.len() == 1 && list[0].is_directory() {
            let folder = list.remove(0);
            info!("分享根为单个目录，下钻: {}", folder.server_filename);
            title = Some(folder.server_filename.clone());

            match self
                .fetch_list_post(api_url, &share.surl, &share.source_url, Some(&folder.fs_id))
                .await
            {
                Ok(inner) if inner.is_success() && !inner.list.is_empty() => {
                    list = inner.list;
                }
                Ok(inner) => {
                    warn!("目录下钻返回 errno={}，以当前列表为准", inner.errno);
                    list.push(folder);
                    break;
                }
                Err(e) => {
                    warn!("目录下钻失败，以当前列表为准: {}", e);
                    list.push(folder);
                    break;
                }
            }
            depth += 1;
        }

        Ok(Some(ShareListing {
            share: share.clone(),
            title,
            share_username,
            files: list,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_endpoint_table() {
        assert_eq!(
            ShareListingClient::pick_post_endpoint("www.1024tera.com"),
            "https://www.1024tera.com/share/list"
        );
        assert_eq!(
            ShareListingClient::pick_post_endpoint("dm.terabox.app"),
            "https://www.terabox.app/share/list"
        );
        assert_eq!(
            ShareListingClient::pick_post_endpoint("WWW.TERABOX.COM"),
            "https://www.terabox.com/share/list"
        );
        // 未知域名走兜底端点
        assert_eq!(
            ShareListingClient::pick_post_endpoint("example.org"),
            "https://www.terabox.app/share/list"
        );
    }
}
