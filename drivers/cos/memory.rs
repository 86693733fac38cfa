//! In-memory COS backend for tests / 内存后端（测试用）
//!
//! Mirrors GET Bucket semantics (prefix, delimiter, marker, max-keys) and lets
//! tests inject failures per key or per listing call.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;

use crate::storage::BackendError;
use super::client::{BackendResult, CosBackend};
use super::types::{
    AccessControlList, AccessControlPolicy, CannedAcl, CommonPrefix, Grant, Grantee, ListBucketResult,
    ListObjectsRequest, ObjectMeta, ObjectRecord, PresignOptions, PutOptions, ALL_USERS_URI,
};

const LAST_MODIFIED: &str = "2024-01-02T03:04:05.000Z";

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub data: Bytes,
    pub options: PutOptions,
    pub acl: Option<CannedAcl>,
}

#[derive(Default)]
struct State {
    objects: BTreeMap<String, StoredObject>,
    remote: BTreeMap<String, Bytes>,
    fail_copy: HashSet<String>,
    fail_delete: HashSet<String>,
    fail_list_on_call: Option<usize>,
    scripted_markers: VecDeque<String>,
    calls: usize,
    list_calls: usize,
    list_requests: Vec<ListObjectsRequest>,
}

#[derive(Default)]
pub struct MemoryBackend {
    state: Mutex<State>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: &str, data: &[u8]) {
        self.state.lock().objects.insert(
            key.to_string(),
            StoredObject {
                data: Bytes::copy_from_slice(data),
                options: PutOptions::default(),
                acl: None,
            },
        );
    }

    pub fn object(&self, key: &str) -> Option<StoredObject> {
        self.state.lock().objects.get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.state.lock().objects.contains_key(key)
    }

    /// Content served by `fetch_url` / 远程URL内容
    pub fn insert_remote(&self, url: &str, data: &[u8]) {
        self.state.lock().remote.insert(url.to_string(), Bytes::copy_from_slice(data));
    }

    pub fn fail_copy(&self, source_key: &str) {
        self.state.lock().fail_copy.insert(source_key.to_string());
    }

    pub fn fail_delete(&self, key: &str) {
        self.state.lock().fail_delete.insert(key.to_string());
    }

    /// The n-th listing call (1-based) fails / 第n次列举失败
    pub fn fail_list_on_call(&self, call: usize) {
        self.state.lock().fail_list_on_call = Some(call);
    }

    /// Always answer with the first page and this marker / 模拟标记不前进
    pub fn stall_marker(&self, marker: &str) {
        self.script_markers(&[marker]);
    }

    /// Answer every page as truncated, handing out these markers in turn;
    /// the last one repeats / 按顺序返回指定标记
    pub fn script_markers(&self, markers: &[&str]) {
        self.state.lock().scripted_markers = markers.iter().map(|m| m.to_string()).collect();
    }

    /// Backend calls of any kind / 后端调用次数
    pub fn calls(&self) -> usize {
        self.state.lock().calls
    }

    pub fn list_calls(&self) -> usize {
        self.state.lock().list_calls
    }

    pub fn list_requests(&self) -> Vec<ListObjectsRequest> {
        self.state.lock().list_requests.clone()
    }

    fn list_page(objects: &BTreeMap<String, StoredObject>, request: &ListObjectsRequest) -> ListBucketResult {
        enum Item {
            Object(String),
            Prefix(String),
        }

        let max_keys = request.max_keys.max(1) as usize;
        let mut items: Vec<Item> = Vec::new();
        for key in objects.keys() {
            if !key.starts_with(&request.prefix) || key.as_str() <= request.marker.as_str() {
                continue;
            }
            let rest = &key[request.prefix.len()..];
            let group = request
                .delimiter
                .as_deref()
                .and_then(|d| rest.find(d).map(|idx| key[..request.prefix.len() + idx + d.len()].to_string()));
            match group {
                Some(prefix) => {
                    if prefix.as_str() <= request.marker.as_str() {
                        continue;
                    }
                    if matches!(items.last(), Some(Item::Prefix(p)) if *p == prefix) {
                        continue;
                    }
                    items.push(Item::Prefix(prefix));
                }
                None => items.push(Item::Object(key.clone())),
            }
            if items.len() > max_keys {
                break;
            }
        }

        let is_truncated = items.len() > max_keys;
        items.truncate(max_keys);
        let next_marker = if is_truncated {
            items.last().map(|item| match item {
                Item::Object(k) | Item::Prefix(k) => k.clone(),
            })
        } else {
            None
        };

        let mut page = ListBucketResult {
            prefix: request.prefix.clone(),
            marker: request.marker.clone(),
            is_truncated,
            // COS leaves NextMarker out when no delimiter is sent
            next_marker: next_marker.filter(|_| request.delimiter.is_some()),
            ..Default::default()
        };
        for item in items {
            match item {
                Item::Object(key) => {
                    let size = objects.get(&key).map(|o| o.data.len() as u64);
                    page.contents.push(ObjectRecord {
                        key,
                        size,
                        last_modified: Some(LAST_MODIFIED.to_string()),
                        etag: None,
                    });
                }
                Item::Prefix(prefix) => page.common_prefixes.push(CommonPrefix { prefix }),
            }
        }
        page
    }
}

#[async_trait]
impl CosBackend for MemoryBackend {
    async fn head_object(&self, key: &str) -> BackendResult<ObjectMeta> {
        let mut state = self.state.lock();
        state.calls += 1;
        let object = state.objects.get(key).ok_or_else(|| BackendError::not_found(key))?;
        Ok(ObjectMeta {
            content_length: Some(object.data.len() as u64),
            last_modified: Some("Tue, 02 Jan 2024 03:04:05 GMT".to_string()),
            content_type: object.options.content_type.clone(),
            etag: None,
        })
    }

    async fn put_object(&self, key: &str, body: Bytes, options: &PutOptions) -> BackendResult<()> {
        let mut state = self.state.lock();
        state.calls += 1;
        state.objects.insert(
            key.to_string(),
            StoredObject {
                data: body,
                options: options.clone(),
                acl: options.acl,
            },
        );
        Ok(())
    }

    async fn get_object(&self, key: &str) -> BackendResult<Bytes> {
        let mut state = self.state.lock();
        state.calls += 1;
        state
            .objects
            .get(key)
            .map(|o| o.data.clone())
            .ok_or_else(|| BackendError::not_found(key))
    }

    async fn delete_object(&self, key: &str) -> BackendResult<()> {
        let mut state = self.state.lock();
        state.calls += 1;
        if state.fail_delete.contains(key) {
            return Err(BackendError::service(403, "AccessDenied", "delete denied"));
        }
        state.objects.remove(key);
        Ok(())
    }

    async fn copy_object(&self, source_key: &str, destination_key: &str) -> BackendResult<()> {
        let mut state = self.state.lock();
        state.calls += 1;
        if state.fail_copy.contains(source_key) {
            return Err(BackendError::service(500, "InternalError", "copy failed"));
        }
        let object = state
            .objects
            .get(source_key)
            .cloned()
            .ok_or_else(|| BackendError::not_found(source_key))?;
        state.objects.insert(destination_key.to_string(), object);
        Ok(())
    }

    async fn list_objects(&self, request: &ListObjectsRequest) -> BackendResult<ListBucketResult> {
        let mut state = self.state.lock();
        state.calls += 1;
        state.list_calls += 1;
        state.list_requests.push(request.clone());
        if state.fail_list_on_call == Some(state.list_calls) {
            return Err(BackendError::service(503, "ServiceUnavailable", "slow down"));
        }
        let scripted = if state.scripted_markers.len() > 1 {
            state.scripted_markers.pop_front()
        } else {
            state.scripted_markers.front().cloned()
        };
        if let Some(marker) = scripted {
            let first = ListObjectsRequest {
                marker: String::new(),
                ..request.clone()
            };
            let mut page = Self::list_page(&state.objects, &first);
            page.is_truncated = true;
            page.next_marker = Some(marker);
            return Ok(page);
        }
        Ok(Self::list_page(&state.objects, request))
    }

    async fn get_object_acl(&self, key: &str) -> BackendResult<AccessControlPolicy> {
        let mut state = self.state.lock();
        state.calls += 1;
        let object = state.objects.get(key).ok_or_else(|| BackendError::not_found(key))?;
        let mut grants = vec![Grant {
            grantee: Grantee {
                uri: None,
                id: Some("qcs::cam::uin/1:uin/1".to_string()),
            },
            permission: "FULL_CONTROL".to_string(),
        }];
        if object.acl == Some(CannedAcl::PublicRead) {
            grants.push(Grant {
                grantee: Grantee {
                    uri: Some(format!("http://cam.qcloud.com/groups/{}", ALL_USERS_URI)),
                    id: None,
                },
                permission: "READ".to_string(),
            });
        }
        Ok(AccessControlPolicy {
            owner: None,
            access_control_list: AccessControlList { grants },
        })
    }

    async fn put_object_acl(&self, key: &str, acl: CannedAcl) -> BackendResult<()> {
        let mut state = self.state.lock();
        state.calls += 1;
        let object = state
            .objects
            .get_mut(key)
            .ok_or_else(|| BackendError::not_found(key))?;
        object.acl = Some(acl);
        Ok(())
    }

    fn presign_get(&self, key: &str, expires: Duration, options: &PresignOptions) -> BackendResult<String> {
        self.state.lock().calls += 1;
        let scheme = options.scheme.as_deref().unwrap_or("https");
        Ok(format!(
            "{}://memory/{}?q-sign-time={}",
            scheme,
            key,
            expires.as_secs()
        ))
    }

    async fn fetch_url(&self, url: &str) -> BackendResult<Bytes> {
        let mut state = self.state.lock();
        state.calls += 1;
        state
            .remote
            .get(url)
            .cloned()
            .ok_or_else(|| BackendError::service(404, "NotFound", url.to_string()))
    }
}

/// Process-wide log buffer for asserting on emitted events / 日志捕获
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    /// Install the capturing subscriber once for the whole test binary / 安装全局日志捕获
    pub fn global() -> &'static LogCapture {
        static CAPTURE: OnceLock<LogCapture> = OnceLock::new();
        CAPTURE.get_or_init(|| {
            let capture = LogCapture::default();
            let writer = capture.clone();
            let subscriber = tracing_subscriber::fmt()
                .with_writer(move || writer.clone())
                .with_ansi(false)
                .with_max_level(tracing::Level::WARN)
                .finish();
            let _ = tracing::subscriber::set_global_default(subscriber);
            capture
        })
    }

    /// Whether a WARN line containing `needle` was logged / 是否记录了警告
    pub fn warned(&self, needle: &str) -> bool {
        String::from_utf8_lossy(&self.0.lock())
            .lines()
            .any(|line| line.contains("WARN") && line.contains(needle))
    }
}

impl std::io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(prefix: &str, delimiter: Option<&str>, marker: &str, max_keys: u32) -> ListObjectsRequest {
        ListObjectsRequest {
            prefix: prefix.to_string(),
            delimiter: delimiter.map(str::to_string),
            marker: marker.to_string(),
            max_keys,
        }
    }

    #[tokio::test]
    async fn test_list_groups_common_prefixes() {
        let backend = MemoryBackend::new();
        for key in ["p/a.txt", "p/sub/1.txt", "p/sub/2.txt", "p/z.txt", "q/x.txt"] {
            backend.insert(key, b"1");
        }
        let page = backend.list_objects(&request("p/", Some("/"), "", 1000)).await.unwrap();
        let keys: Vec<_> = page.contents.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(keys, vec!["p/a.txt", "p/z.txt"]);
        assert_eq!(page.common_prefixes.len(), 1);
        assert_eq!(page.common_prefixes[0].prefix, "p/sub/");
        assert!(!page.is_truncated);
    }

    #[tokio::test]
    async fn test_list_marker_skips_grouped_prefix() {
        let backend = MemoryBackend::new();
        for key in ["p/a/1", "p/a/2", "p/b"] {
            backend.insert(key, b"1");
        }
        let first = backend.list_objects(&request("p/", Some("/"), "", 1)).await.unwrap();
        assert!(first.is_truncated);
        assert_eq!(first.next_marker.as_deref(), Some("p/a/"));
        let second = backend.list_objects(&request("p/", Some("/"), "p/a/", 1)).await.unwrap();
        assert_eq!(second.contents[0].key, "p/b");
        assert!(second.common_prefixes.is_empty());
        assert!(!second.is_truncated);
    }
}
