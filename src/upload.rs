//! Sends planning instances to the optimization server and decodes its replies.
//!
//! Every call issues exactly one multipart POST carrying the file under the
//! `file` field. Nothing is retried and no timeout is applied; failures are
//! returned to the caller, which logs them.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::SiteConfig;
use crate::error::UploadError;

/// Multipart field name the server reads the instance from.
pub const FILE_FIELD: &str = "file";

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Endpoint {
    /// Registers a new optimization and answers with its id.
    NewOptim,
    /// Answers with a JSON summary of the instance.
    SummaryJson,
}

impl Endpoint {
    pub fn path(self) -> &'static str {
        match self {
            Endpoint::NewOptim => "/optim/new",
            Endpoint::SummaryJson => "/optim-json",
        }
    }
}

/// Form body with a single file field.
#[derive(Clone, Debug)]
pub struct UploadForm<F> {
    pub field: &'static str,
    pub file: F,
}

impl<F> UploadForm<F> {
    pub fn with_file(file: F) -> Self {
        UploadForm { field: FILE_FIELD, file }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Issues the POST. The browser implementation goes through `fetch`.
#[allow(async_fn_in_trait)]
pub trait Transport {
    type File;

    async fn post_form(&self, url: &str, form: UploadForm<Self::File>) -> Result<HttpReply, UploadError>;
}

/// Bytes in one message word.
const WORD: usize = 8;
/// List element size code for one-byte elements.
const BYTE_ELEMENTS: u64 = 2;
const ID_LEN: usize = 16;

fn word(data: &[u8], index: usize) -> Option<u64> {
    let start = index.checked_mul(WORD)?;
    let bytes = data.get(start..start.checked_add(WORD)?)?;
    Some(u64::from_le_bytes(bytes.try_into().ok()?))
}

/// Word a pointer stored at `at` refers to: its signed 30-bit offset counts
/// from the word after the pointer.
fn pointer_target(at: usize, pointer: u64) -> Option<usize> {
    let offset = ((pointer as u32 as i32) >> 2) as isize;
    at.checked_add(1)?.checked_add_signed(offset)
}

/// Finds the 16 id bytes in a single-segment message whose root struct holds
/// the id as a byte list in its first pointer field.
fn id_from_frame(data: &[u8]) -> Result<&[u8], UploadError> {
    let table = word(data, 0).ok_or(UploadError::InvalidId("reply is shorter than a segment table"))?;
    if table as u32 != 0 {
        return Err(UploadError::InvalidId("reply has more than one segment"));
    }
    let segment = ((table >> 32) as usize)
        .checked_mul(WORD)
        .and_then(|len| data[WORD..].get(..len))
        .ok_or(UploadError::InvalidId("segment is truncated"))?;

    let root = word(segment, 0).ok_or(UploadError::InvalidId("segment has no root"))?;
    if root & 3 != 0 {
        return Err(UploadError::InvalidId("root is not a struct"));
    }
    let data_words = (root >> 32) as u16 as usize;
    let pointer_count = (root >> 48) as u16;
    if pointer_count == 0 {
        return Err(UploadError::InvalidId("root has no id field"));
    }
    let field = pointer_target(0, root)
        .and_then(|start| start.checked_add(data_words))
        .ok_or(UploadError::InvalidId("root pointer is out of bounds"))?;

    let list = word(segment, field).ok_or(UploadError::InvalidId("id field is out of bounds"))?;
    if list & 3 != 1 {
        return Err(UploadError::InvalidId("id field is not a list"));
    }
    if (list >> 32) & 7 != BYTE_ELEMENTS {
        return Err(UploadError::InvalidId("id list does not hold bytes"));
    }
    if (list >> 35) as usize != ID_LEN {
        return Err(UploadError::InvalidId("id list is not 16 bytes long"));
    }
    pointer_target(field, list)
        .and_then(|start| start.checked_mul(WORD))
        .and_then(|start| segment.get(start..start.checked_add(ID_LEN)?))
        .ok_or(UploadError::InvalidId("id list is out of bounds"))
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct OptimId(uuid::Uuid);

impl OptimId {
    /// Accepts the server's framed reply or a bare 16-byte id.
    pub fn from_bytes(data: &[u8]) -> Result<Self, UploadError> {
        let raw = if data.len() == ID_LEN { data } else { id_from_frame(data)? };
        let bytes: [u8; ID_LEN] = raw.try_into().map_err(|_| UploadError::InvalidId("id is not 16 bytes long"))?;
        Ok(OptimId(uuid::Uuid::from_bytes(bytes)))
    }

    pub fn as_uuid(&self) -> &uuid::Uuid { &self.0 }
}

impl fmt::Display for OptimId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceSummary {
    ndays: u32,
    ninterventions: u32,
    nresources: u32,
    nscenarios: u32,
}

impl MaintenanceSummary {
    pub fn from_json(contents: &str) -> Result<Self, UploadError> {
        Ok(serde_json::from_str(contents)?)
    }

    pub fn ndays(&self) -> u32 { self.ndays }

    pub fn ninterventions(&self) -> u32 { self.ninterventions }

    pub fn nresources(&self) -> u32 { self.nresources }

    pub fn nscenarios(&self) -> u32 { self.nscenarios }
}

/// Raw text of a `/optim-json` reply, plus the summary when the text parses as one.
#[derive(Clone, Debug)]
pub struct SummaryReply {
    pub text: String,
    pub summary: Option<MaintenanceSummary>,
}

pub struct Uploader<T> {
    transport: T,
    config: SiteConfig,
}

impl<T: Transport> Uploader<T> {
    pub fn new(transport: T, config: &SiteConfig) -> Self {
        Uploader { transport, config: config.clone() }
    }

    async fn post(&self, endpoint: Endpoint, file: T::File) -> Result<Vec<u8>, UploadError> {
        let url = self.config.endpoint_url(endpoint);
        log::debug!("POST {}", url);
        let reply = self.transport.post_form(&url, UploadForm::with_file(file)).await?;
        if !reply.is_success() {
            return Err(UploadError::Status(reply.status));
        }
        Ok(reply.body)
    }

    pub async fn send_new_optim(&self, file: T::File) -> Result<OptimId, UploadError> {
        let body = self.post(Endpoint::NewOptim, file).await?;
        OptimId::from_bytes(&body)
    }

    pub async fn send_summary_json(&self, file: T::File) -> Result<SummaryReply, UploadError> {
        let body = self.post(Endpoint::SummaryJson, file).await?;
        let text = String::from_utf8(body)?;
        log::info!("{}", text);
        let summary = match MaintenanceSummary::from_json(&text) {
            Ok(summary) => Some(summary),
            Err(e) => {
                log::warn!("reply is not a maintenance summary: {}", e);
                None
            }
        };
        Ok(SummaryReply { text, summary })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct RecordingTransport {
        reply: HttpReply,
        sent: RefCell<Vec<(String, UploadForm<Vec<u8>>)>>,
    }

    impl RecordingTransport {
        fn answering(status: u16, body: &[u8]) -> Self {
            RecordingTransport {
                reply: HttpReply { status, body: body.to_vec() },
                sent: RefCell::new(Vec::new()),
            }
        }
    }

    impl Transport for RecordingTransport {
        type File = Vec<u8>;

        async fn post_form(&self, url: &str, form: UploadForm<Vec<u8>>) -> Result<HttpReply, UploadError> {
            self.sent.borrow_mut().push((url.to_string(), form));
            Ok(self.reply.clone())
        }
    }

    fn uploader(transport: RecordingTransport) -> Uploader<RecordingTransport> {
        let config = SiteConfig { server: "http://10.0.0.7:8000/".into(), ..SiteConfig::default() };
        Uploader::new(transport, &config)
    }

    const ID: [u8; 16] = [
        0x67, 0xe5, 0x50, 0x44, 0x10, 0xb1, 0x42, 0x6f,
        0x92, 0x47, 0xbb, 0x68, 0x0e, 0x5f, 0xe0, 0xc8,
    ];

    #[test]
    fn new_optim_posts_file_once() {
        let up = uploader(RecordingTransport::answering(202, &ID));
        let id = pollster::block_on(up.send_new_optim(b"{\"T\": 3}".to_vec())).unwrap();

        assert_eq!(id.to_string(), "67e55044-10b1-426f-9247-bb680e5fe0c8");
        let sent = up.transport.sent.borrow();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "http://10.0.0.7:8000/optim/new");
        assert_eq!(sent[0].1.field, "file");
        assert_eq!(sent[0].1.file, b"{\"T\": 3}".to_vec());
    }

    #[test]
    fn short_id_is_rejected() {
        let up = uploader(RecordingTransport::answering(202, &ID[..10]));
        let err = pollster::block_on(up.send_new_optim(vec![1, 2, 3])).unwrap_err();
        assert!(matches!(err, UploadError::InvalidId(_)));
        assert_eq!(up.transport.sent.borrow().len(), 1);
    }

    fn framed(id: &[u8]) -> Vec<u8> {
        let mut frame = vec![
            0, 0, 0, 0, 4, 0, 0, 0,
            0, 0, 0, 0, 0, 0, 1, 0,
            1, 0, 0, 0, 0x82, 0, 0, 0,
        ];
        frame.extend_from_slice(id);
        frame
    }

    #[test]
    fn framed_id_is_decoded() {
        let frame = framed(&ID);
        assert_eq!(frame.len(), 40);
        let up = uploader(RecordingTransport::answering(202, &frame));
        let id = pollster::block_on(up.send_new_optim(vec![1])).unwrap();
        assert_eq!(id.to_string(), "67e55044-10b1-426f-9247-bb680e5fe0c8");
    }

    #[test]
    fn framed_id_follows_struct_data_words() {
        // One data word ahead of the pointer section; the list offset skips it.
        let mut frame = vec![
            0, 0, 0, 0, 5, 0, 0, 0,
            0, 0, 0, 0, 1, 0, 1, 0,
            0xaa, 0xbb, 0, 0, 0, 0, 0, 0,
            1, 0, 0, 0, 0x82, 0, 0, 0,
        ];
        frame.extend_from_slice(&ID);
        assert_eq!(OptimId::from_bytes(&frame).unwrap().as_uuid().as_bytes(), &ID);
    }

    #[test]
    fn malformed_frames_are_rejected() {
        let mut two_segments = framed(&ID);
        two_segments[0] = 1;
        let mut word_list = framed(&ID);
        word_list[20] = 0x85;
        let mut long_list = framed(&ID);
        long_list[20] = 0x8a;
        let mut far_list = framed(&ID);
        far_list[16] = 1 | (4 << 2);
        let truncated = &framed(&ID)[..32];

        for frame in [&two_segments[..], &word_list[..], &long_list[..], &far_list[..], truncated] {
            assert!(matches!(OptimId::from_bytes(frame), Err(UploadError::InvalidId(_))));
        }
    }

    #[test]
    fn summary_body_must_be_utf8() {
        let up = uploader(RecordingTransport::answering(202, &[0xff, 0xfe, 0x7b]));
        let err = pollster::block_on(up.send_summary_json(vec![1])).unwrap_err();
        assert!(matches!(err, UploadError::Utf8(_)));
        assert_eq!(up.transport.sent.borrow().len(), 1);
    }

    #[test]
    fn error_status_is_reported() {
        let up = uploader(RecordingTransport::answering(500, b""));
        let err = pollster::block_on(up.send_new_optim(vec![0])).unwrap_err();
        assert!(matches!(err, UploadError::Status(500)));
    }

    #[test]
    fn summary_json_is_parsed() {
        let body = br#"{"ndays": 365, "ninterventions": 12, "nresources": 5, "nscenarios": 3}"#;
        let up = uploader(RecordingTransport::answering(202, body));
        let reply = pollster::block_on(up.send_summary_json(vec![7; 32])).unwrap();

        let summary = reply.summary.unwrap();
        assert_eq!(summary.ndays(), 365);
        assert_eq!(summary.ninterventions(), 12);
        assert_eq!(summary.nresources(), 5);
        assert_eq!(summary.nscenarios(), 3);
        let sent = up.transport.sent.borrow();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "http://10.0.0.7:8000/optim-json");
        assert_eq!(sent[0].1.file, vec![7; 32]);
    }

    #[test]
    fn non_summary_text_is_still_returned() {
        let up = uploader(RecordingTransport::answering(202, br#""code": error"#));
        let reply = pollster::block_on(up.send_summary_json(vec![])).unwrap();
        assert_eq!(reply.text, r#""code": error"#);
        assert!(reply.summary.is_none());
    }
}
