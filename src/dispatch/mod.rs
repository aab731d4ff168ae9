//! Document dispatcher: routes an upload through a per-document transform.
//!
//! An upload is either a single document or a zip bundle of documents. Single documents are
//! handed to the transform once and the result is returned unwrapped. Bundles are unpacked,
//! every member is transformed independently and in archive order, and the outcomes are
//! collected into a [`BundleReport`] keyed by member name. A failing member never aborts its
//! siblings; only structural archive problems fail the whole dispatch.

pub mod bundle;

use async_trait::async_trait;
use std::collections::HashSet;
use thiserror::Error;

pub use bundle::{BundleEntry, BundleMember};

/// Suffix used for the per-member error record written into result bundles.
pub const ERROR_ENTRY_SUFFIX: &str = ".error.txt";

/// Whole-request failures raised while handling a bundle.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The archive could not be opened or its directory could not be read.
    #[error("Invalid archive: {0}")]
    InvalidBundle(String),
    /// The archive was readable but contained no documents.
    #[error("Archive contains no documents")]
    EmptyBundle,
    /// The result archive could not be assembled.
    #[error("Failed to assemble result archive: {0}")]
    Pack(String),
}

/// Failures attributed to a single document.
#[derive(Debug, Clone, Error)]
pub enum TransformError {
    /// The transform does not handle this kind of document.
    #[error("Unsupported file type for {name}; expected one of: {expected}")]
    Unsupported {
        /// Name of the rejected document.
        name: String,
        /// Comma separated list of accepted extensions.
        expected: String,
    },
    /// The document content is unusable (corrupt, wrong encoding, empty).
    #[error("Invalid document {name}: {reason}")]
    InvalidDocument {
        /// Name of the rejected document.
        name: String,
        /// Human readable reason.
        reason: String,
    },
    /// The archive member could not be extracted safely.
    #[error("Could not extract {name}: {reason}")]
    Extraction {
        /// Raw member name as stored in the archive.
        name: String,
        /// Human readable reason.
        reason: String,
    },
    /// A delegated service (OCR, LLM) failed.
    #[error("Upstream service failed for {name}: {reason}")]
    Upstream {
        /// Name of the document being processed.
        name: String,
        /// Error reported by the upstream client.
        reason: String,
    },
}

/// Whether an upload is a single document or an archive of documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    /// A standalone document handed to the transform as-is.
    Single,
    /// A zip archive whose members are transformed individually.
    Bundle,
}

/// A named byte payload received from a client or extracted from a bundle.
#[derive(Debug, Clone)]
pub struct Document {
    /// Original filename, or the member path for bundle members.
    pub name: String,
    /// Raw document bytes.
    pub content: Vec<u8>,
}

impl Document {
    /// Construct a document from a name and its bytes.
    pub fn new(name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    /// Last path component of the document name.
    pub fn file_name(&self) -> &str {
        self.name
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(self.name.as_str())
    }

    /// Lower-cased extension without the leading dot.
    pub fn extension(&self) -> Option<String> {
        let file_name = self.file_name();
        let (stem, ext) = file_name.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }

    /// Name without its extension, keeping any directory components.
    pub fn stem_path(&self) -> &str {
        match self.extension() {
            Some(ext) => &self.name[..self.name.len() - ext.len() - 1],
            None => &self.name,
        }
    }

    /// File name without directory components or extension.
    pub fn file_stem(&self) -> &str {
        let file_name = self.file_name();
        match self.extension() {
            Some(ext) => &file_name[..file_name.len() - ext.len() - 1],
            None => file_name,
        }
    }

    /// MIME type guessed from the extension.
    pub fn mime_type(&self) -> String {
        mime_guess::from_path(self.file_name())
            .first_or_octet_stream()
            .essence_str()
            .to_string()
    }

    /// Decide whether this upload is a bundle.
    ///
    /// A `.zip` extension always marks a bundle. Extension-less uploads are sniffed, since
    /// container formats such as `.docx` share the zip signature.
    pub fn kind(&self) -> DocumentKind {
        match self.extension().as_deref() {
            Some("zip") => DocumentKind::Bundle,
            None if infer::archive::is_zip(&self.content) => DocumentKind::Bundle,
            _ => DocumentKind::Single,
        }
    }

    /// Borrow the content as UTF-8 text.
    pub fn text(&self) -> Result<&str, TransformError> {
        std::str::from_utf8(&self.content).map_err(|error| TransformError::InvalidDocument {
            name: self.name.clone(),
            reason: format!("content is not valid UTF-8: {error}"),
        })
    }
}

/// A file produced by rendering a transform result, named relative to its source document.
#[derive(Debug, Clone)]
pub struct RenderedFile {
    /// Appended to the source document's extension-less path, e.g. `.txt` or `_QA.json`.
    pub suffix: String,
    /// File content.
    pub content: Vec<u8>,
}

impl RenderedFile {
    /// Convenience constructor.
    pub fn new(suffix: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            suffix: suffix.into(),
            content: content.into(),
        }
    }
}

/// Per-document processing step plugged into the dispatcher.
#[async_trait]
pub trait DocumentTransform: Send + Sync {
    /// Successful result of transforming one document.
    type Output: Send;

    /// Short label used in logs and result archive names.
    fn label(&self) -> &'static str;

    /// Lower-cased extensions this transform accepts.
    fn accepted_extensions(&self) -> &'static [&'static str];

    /// Whether the document is of a kind this transform handles.
    fn accepts(&self, document: &Document) -> bool {
        document
            .extension()
            .is_some_and(|ext| self.accepted_extensions().contains(&ext.as_str()))
    }

    /// Transform one document.
    async fn apply(&self, document: &Document) -> Result<Self::Output, TransformError>;

    /// Render a successful result into the files stored in a result bundle.
    fn render(&self, output: &Self::Output) -> Vec<RenderedFile>;
}

/// Outcome of a dispatch: the unwrapped single result, or a per-member report.
pub enum Dispatched<T> {
    /// A single document was transformed.
    Single {
        /// Name of the uploaded document.
        name: String,
        /// The transform's result, success or error.
        result: Result<T, TransformError>,
    },
    /// A bundle was unpacked and every member transformed.
    Bundle(BundleReport<T>),
}

/// Result for a single bundle member.
#[derive(Debug)]
pub struct MemberResult<T> {
    /// Member name as it appeared in the archive.
    pub name: String,
    /// Transform outcome for the member.
    pub outcome: Result<T, TransformError>,
}

/// Ordered, name-keyed results for every member of a bundle.
#[derive(Debug)]
pub struct BundleReport<T> {
    members: Vec<MemberResult<T>>,
}

impl<T> BundleReport<T> {
    /// Member names in archive order.
    pub fn keys(&self) -> Vec<&str> {
        self.members.iter().map(|member| member.name.as_str()).collect()
    }

    /// Number of members in the report.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the report has no members.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Number of members transformed successfully.
    pub fn succeeded(&self) -> usize {
        self.members
            .iter()
            .filter(|member| member.outcome.is_ok())
            .count()
    }

    /// Number of members whose transform failed.
    pub fn failed(&self) -> usize {
        self.len() - self.succeeded()
    }

    /// Look up a member outcome by name.
    pub fn get(&self, name: &str) -> Option<&Result<T, TransformError>> {
        self.members
            .iter()
            .find(|member| member.name == name)
            .map(|member| &member.outcome)
    }

    /// Iterate over member results in archive order.
    pub fn iter(&self) -> impl Iterator<Item = &MemberResult<T>> {
        self.members.iter()
    }

    /// Render every member into output entries: transform output for successes, an
    /// `.error.txt` record for failures.
    pub fn entries<F>(&self, transform: &F) -> Vec<BundleEntry>
    where
        F: DocumentTransform<Output = T> + ?Sized,
    {
        let mut names = OutputNames::default();
        let mut entries = Vec::new();
        for member in &self.members {
            let source = Document::new(contained_path(&member.name), Vec::new());
            match &member.outcome {
                Ok(output) => {
                    for file in transform.render(output) {
                        entries.push(BundleEntry {
                            name: names.claim(&source, &file.suffix),
                            content: file.content,
                        });
                    }
                }
                Err(error) => entries.push(BundleEntry {
                    name: names.claim(&source, ERROR_ENTRY_SUFFIX),
                    content: format!("{error}\n").into_bytes(),
                }),
            }
        }
        entries
    }

    /// Encode the rendered entries as a zip archive.
    pub fn into_archive<F>(self, transform: &F) -> Result<Vec<u8>, DispatchError>
    where
        F: DocumentTransform<Output = T> + ?Sized,
    {
        bundle::pack(&self.entries(transform))
    }
}

/// Allocates unique entry names for a result bundle.
#[derive(Default)]
struct OutputNames {
    taken: HashSet<String>,
}

impl OutputNames {
    fn claim(&mut self, source: &Document, suffix: &str) -> String {
        let preferred = format!("{}{suffix}", source.stem_path());
        if self.taken.insert(preferred.clone()) {
            return preferred;
        }
        let qualified = format!("{}{suffix}", source.name);
        if self.taken.insert(qualified.clone()) {
            return qualified;
        }
        let mut counter = 2;
        loop {
            let candidate = format!("{}_{counter}{suffix}", source.stem_path());
            if self.taken.insert(candidate.clone()) {
                return candidate;
            }
            counter += 1;
        }
    }
}

/// Relative form of a member name: empty, `.` and `..` components are dropped.
fn contained_path(name: &str) -> String {
    let path = name
        .split(['/', '\\'])
        .filter(|component| !matches!(*component, "" | "." | ".."))
        .collect::<Vec<_>>()
        .join("/");
    if path.is_empty() {
        "unnamed".to_string()
    } else {
        path
    }
}

/// Dispatch an upload through `transform`.
pub async fn dispatch<F>(
    upload: Document,
    transform: &F,
) -> Result<Dispatched<F::Output>, DispatchError>
where
    F: DocumentTransform + ?Sized,
{
    match upload.kind() {
        DocumentKind::Single => {
            tracing::debug!(
                transform = transform.label(),
                document = %upload.name,
                bytes = upload.content.len(),
                "Dispatching single document"
            );
            let result = apply_checked(&upload, transform).await;
            Ok(Dispatched::Single {
                name: upload.name,
                result,
            })
        }
        DocumentKind::Bundle => {
            let members = bundle::unpack(&upload.content)?;
            tracing::debug!(
                transform = transform.label(),
                bundle = %upload.name,
                members = members.len(),
                "Dispatching bundle"
            );
            let report = process_members(members, transform).await?;
            Ok(Dispatched::Bundle(report))
        }
    }
}

/// Transform every member sequentially, recording failures per member.
pub async fn process_members<F>(
    members: Vec<BundleMember>,
    transform: &F,
) -> Result<BundleReport<F::Output>, DispatchError>
where
    F: DocumentTransform + ?Sized,
{
    if members.is_empty() {
        return Err(DispatchError::EmptyBundle);
    }

    let total = members.len();
    let mut results = Vec::with_capacity(total);
    for (index, member) in members.into_iter().enumerate() {
        let outcome = match member.content {
            Ok(content) => {
                let document = Document::new(member.name.clone(), content);
                apply_checked(&document, transform).await
            }
            Err(error) => Err(error),
        };
        match &outcome {
            Ok(_) => tracing::info!(
                transform = transform.label(),
                member = %member.name,
                position = index + 1,
                total,
                "Bundle member processed"
            ),
            Err(error) => tracing::warn!(
                transform = transform.label(),
                member = %member.name,
                position = index + 1,
                total,
                %error,
                "Bundle member failed"
            ),
        }
        results.push(MemberResult {
            name: member.name,
            outcome,
        });
    }

    Ok(BundleReport { members: results })
}

async fn apply_checked<F>(
    document: &Document,
    transform: &F,
) -> Result<F::Output, TransformError>
where
    F: DocumentTransform + ?Sized,
{
    if !transform.accepts(document) {
        return Err(TransformError::Unsupported {
            name: document.name.clone(),
            expected: transform.accepted_extensions().join(", "),
        });
    }
    transform.apply(document).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    struct Shout;

    #[async_trait]
    impl DocumentTransform for Shout {
        type Output = String;

        fn label(&self) -> &'static str {
            "shout"
        }

        fn accepted_extensions(&self) -> &'static [&'static str] {
            &["txt"]
        }

        async fn apply(&self, document: &Document) -> Result<String, TransformError> {
            let text = document.text()?;
            if text.contains("boom") {
                return Err(TransformError::InvalidDocument {
                    name: document.name.clone(),
                    reason: "exploded".into(),
                });
            }
            Ok(text.to_uppercase())
        }

        fn render(&self, output: &String) -> Vec<RenderedFile> {
            vec![RenderedFile::new(".out", output.clone().into_bytes())]
        }
    }

    fn zip_of(files: &[(&str, &[u8])]) -> Vec<u8> {
        let entries: Vec<BundleEntry> = files
            .iter()
            .map(|(name, content)| BundleEntry {
                name: (*name).to_string(),
                content: content.to_vec(),
            })
            .collect();
        bundle::pack(&entries).expect("zip")
    }

    #[test]
    fn document_name_helpers() {
        let doc = Document::new("reports/2024/Summary.Final.PDF", Vec::new());
        assert_eq!(doc.file_name(), "Summary.Final.PDF");
        assert_eq!(doc.extension().as_deref(), Some("pdf"));
        assert_eq!(doc.stem_path(), "reports/2024/Summary.Final");
        assert_eq!(doc.file_stem(), "Summary.Final");
        assert_eq!(doc.mime_type(), "application/pdf");

        let hidden = Document::new(".env", Vec::new());
        assert_eq!(hidden.extension(), None);
        assert_eq!(hidden.stem_path(), ".env");
    }

    #[test]
    fn kind_detects_zip_by_extension_or_signature() {
        let zipped = zip_of(&[("a.txt", b"x")]);
        assert_eq!(
            Document::new("in.ZIP", b"not really".to_vec()).kind(),
            DocumentKind::Bundle
        );
        assert_eq!(
            Document::new("upload", zipped.clone()).kind(),
            DocumentKind::Bundle
        );
        assert_eq!(
            Document::new("letter.docx", zipped).kind(),
            DocumentKind::Single
        );
        assert_eq!(
            Document::new("a.txt", b"hi".to_vec()).kind(),
            DocumentKind::Single
        );
    }

    #[tokio::test]
    async fn single_document_returns_unwrapped_result() {
        let outcome = dispatch(Document::new("note.txt", b"hello".to_vec()), &Shout)
            .await
            .expect("dispatch");
        match outcome {
            Dispatched::Single { name, result } => {
                assert_eq!(name, "note.txt");
                assert_eq!(result.expect("ok"), "HELLO");
            }
            Dispatched::Bundle(_) => panic!("single upload must not produce a bundle"),
        }
    }

    #[tokio::test]
    async fn single_document_error_is_returned_directly() {
        let outcome = dispatch(Document::new("scan.pdf", b"%PDF".to_vec()), &Shout)
            .await
            .expect("dispatch");
        let Dispatched::Single { result, .. } = outcome else {
            panic!("expected single result");
        };
        assert!(matches!(result, Err(TransformError::Unsupported { .. })));
    }

    #[tokio::test]
    async fn bundle_of_one_still_returns_bundle() {
        let upload = Document::new("one.zip", zip_of(&[("only.txt", b"abc")]));
        let outcome = dispatch(upload, &Shout).await.expect("dispatch");
        let Dispatched::Bundle(report) = outcome else {
            panic!("bundle upload must produce a bundle");
        };
        assert_eq!(report.keys(), vec!["only.txt"]);
    }

    #[tokio::test]
    async fn bundle_keys_match_member_names_and_isolate_failures() {
        let upload = Document::new(
            "batch.zip",
            zip_of(&[
                ("a.txt", b"first"),
                ("nested/b.txt", b"boom"),
                ("c.csv", b"x,y"),
                ("d.txt", b"last"),
            ]),
        );
        let Dispatched::Bundle(report) = dispatch(upload, &Shout).await.expect("dispatch") else {
            panic!("expected bundle");
        };

        let keys: BTreeSet<&str> = report.keys().into_iter().collect();
        let expected: BTreeSet<&str> = ["a.txt", "nested/b.txt", "c.csv", "d.txt"].into();
        assert_eq!(keys, expected);
        assert_eq!(report.keys(), vec!["a.txt", "nested/b.txt", "c.csv", "d.txt"]);
        assert_eq!(report.succeeded(), 2);
        assert_eq!(report.failed(), 2);
        assert_eq!(report.get("d.txt").unwrap().as_deref().unwrap(), "LAST");
        assert!(matches!(
            report.get("c.csv"),
            Some(Err(TransformError::Unsupported { .. }))
        ));

        let entries = report.entries(&Shout);
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["a.out", "nested/b.error.txt", "c.error.txt", "d.out"]
        );
        let error_text = String::from_utf8(entries[1].content.clone()).unwrap();
        assert!(error_text.contains("exploded"));
    }

    #[tokio::test]
    async fn corrupt_archive_is_a_structural_error() {
        let upload = Document::new("broken.zip", b"PK\x03\x04garbage".to_vec());
        let error = match dispatch(upload, &Shout).await {
            Err(error) => error,
            Ok(_) => panic!("corrupt archive must fail"),
        };
        assert!(matches!(error, DispatchError::InvalidBundle(_)));
    }

    #[tokio::test]
    async fn archive_without_documents_is_empty() {
        let upload = Document::new(
            "empty.zip",
            zip_of(&[("__MACOSX/._a.txt", b"meta"), (".DS_Store", b"x")]),
        );
        let error = match dispatch(upload, &Shout).await {
            Err(error) => error,
            Ok(_) => panic!("empty archive must fail"),
        };
        assert!(matches!(error, DispatchError::EmptyBundle));
    }

    #[tokio::test]
    async fn colliding_output_names_are_disambiguated() {
        struct AnyExt;

        #[async_trait]
        impl DocumentTransform for AnyExt {
            type Output = ();

            fn label(&self) -> &'static str {
                "any"
            }

            fn accepted_extensions(&self) -> &'static [&'static str] {
                &["pdf", "png"]
            }

            async fn apply(&self, _document: &Document) -> Result<(), TransformError> {
                Ok(())
            }

            fn render(&self, _output: &()) -> Vec<RenderedFile> {
                vec![RenderedFile::new(".txt", Vec::new())]
            }
        }

        let members = vec![
            BundleMember::new("a.pdf", b"1".to_vec()),
            BundleMember::new("a.png", b"2".to_vec()),
            BundleMember::new("a.png", b"3".to_vec()),
        ];
        let report = process_members(members, &AnyExt).await.expect("report");
        let names: Vec<String> = report
            .entries(&AnyExt)
            .into_iter()
            .map(|entry| entry.name)
            .collect();
        assert_eq!(names, vec!["a.txt", "a.png.txt", "a_2.txt"]);
    }

    #[tokio::test]
    async fn escaping_member_names_yield_contained_entries() {
        let members = vec![
            BundleMember {
                name: "../../evil.txt".into(),
                content: Err(TransformError::Extraction {
                    name: "../../evil.txt".into(),
                    reason: "path escapes the archive root".into(),
                }),
            },
            BundleMember::new("/abs/ok.txt", b"fine".to_vec()),
        ];
        let report = process_members(members, &Shout).await.expect("report");
        assert_eq!(report.keys(), vec!["../../evil.txt", "/abs/ok.txt"]);

        let names: Vec<String> = report
            .entries(&Shout)
            .into_iter()
            .map(|entry| entry.name)
            .collect();
        assert_eq!(names, vec!["evil.error.txt", "abs/ok.out"]);
    }
}
