//! Study-resource catalog.
//!
//! The catalog keeps bookkeeping only: size, a BLAKE2b-256 content digest,
//! download counts and who uploaded what.  File bytes are inspected on
//! upload and then discarded.

use crate::accounts::User;
use crate::entry::{iso_millis, mint_id};
use crate::error::CatalogError;
use blake2::digest::{consts::U32, Digest};
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Storage key holding the resource list.
pub const RESOURCES_KEY: &str = "rp_resources";
/// Upload size limit (15 MiB).
pub const MAX_UPLOAD_BYTES: u64 = 15 * 1024 * 1024;
/// Subject areas a resource can be filed under.
pub const SUBJECTS: [&str; 9] = [
    "Mathematics",
    "Science",
    "English",
    "ICT",
    "History",
    "Geography",
    "Commerce",
    "Languages",
    "Other",
];

const PDF_MAGIC: &[u8] = b"%PDF-";

type Blake2b256 = blake2::Blake2b<U32>;

/// A shared study resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    /// Opaque resource id.
    pub id: String,
    /// Resource title.
    pub name: String,
    /// Credited author.
    pub author: String,
    /// Subject area, one of [`SUBJECTS`].
    pub subject: String,
    /// Uploader's user id.
    pub uploader_id: String,
    /// Uploader's display name at upload time.
    pub uploader_name: String,
    /// Number of downloads so far.
    pub download_count: u64,
    /// File size in bytes.
    pub size: u64,
    /// BLAKE2b-256 hex digest of the file contents.
    pub content_digest: String,
    /// Upload time.
    #[serde(with = "iso_millis")]
    pub created_at: DateTime<Utc>,
}

/// Upload form contents.
#[derive(Debug, Clone, Copy)]
pub struct Upload<'a> {
    /// Resource title.
    pub name: &'a str,
    /// Credited author.
    pub author: &'a str,
    /// Subject area.
    pub subject: &'a str,
    /// File contents.
    pub bytes: &'a [u8],
}

/// Resources, newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Catalog {
    resources: Vec<Resource>,
}

impl Catalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// All resources, newest upload first.
    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    /// Looks up a resource by id.
    pub fn find(&self, id: &str) -> Option<&Resource> {
        self.resources.iter().find(|res| res.id == id)
    }

    /// Resources uploaded by `user_id`.
    pub fn uploads_by<'a>(&'a self, user_id: &'a str) -> impl Iterator<Item = &'a Resource> + 'a {
        self.resources
            .iter()
            .filter(move |res| res.uploader_id == user_id)
    }

    /// Validates and records an upload.
    pub fn upload(
        &mut self,
        uploader: &User,
        upload: Upload<'_>,
        now: DateTime<Utc>,
    ) -> Result<&Resource, CatalogError> {
        let name = upload.name.trim();
        let author = upload.author.trim();
        if name.is_empty() || author.is_empty() || upload.bytes.is_empty() {
            return Err(CatalogError::MissingFields);
        }
        if !upload.bytes.starts_with(PDF_MAGIC) {
            return Err(CatalogError::NotPdf);
        }
        let size = upload.bytes.len() as u64;
        if size > MAX_UPLOAD_BYTES {
            return Err(CatalogError::TooLarge {
                size,
                max: MAX_UPLOAD_BYTES,
            });
        }
        let subject = canonical_subject(upload.subject)?;
        let resource = Resource {
            id: mint_id(&now),
            name: name.to_string(),
            author: author.to_string(),
            subject: subject.to_string(),
            uploader_id: uploader.id.clone(),
            uploader_name: uploader.name.clone(),
            download_count: 0,
            size,
            content_digest: content_digest(upload.bytes),
            created_at: now,
        };
        self.resources.insert(0, resource);
        Ok(&self.resources[0])
    }

    /// Counts a download and returns the updated resource.
    pub fn download(&mut self, id: &str) -> Result<&Resource, CatalogError> {
        let resource = self
            .resources
            .iter_mut()
            .find(|res| res.id == id)
            .ok_or_else(|| CatalogError::UnknownResource(id.to_string()))?;
        resource.download_count += 1;
        Ok(&*resource)
    }

    /// Case-insensitive search on name or author, optionally within one subject
    /// (matched case-insensitively, like uploads).
    pub fn search(&self, query: &str, subject: Option<&str>) -> Vec<&Resource> {
        let needle = query.to_lowercase();
        let mut hits: Vec<&Resource> = self
            .resources
            .iter()
            .filter(|res| {
                res.name.to_lowercase().contains(&needle)
                    || res.author.to_lowercase().contains(&needle)
            })
            .filter(|res| {
                subject.map_or(true, |s| res.subject.eq_ignore_ascii_case(s.trim()))
            })
            .collect();
        hits.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        hits
    }

    /// Adds three sample resources credited to `uploader`.
    pub fn seed_samples<R: Rng>(&mut self, uploader: &User, now: DateTime<Utc>, rng: &mut R) -> usize {
        const SAMPLES: [(&str, &str, &str); 3] = [
            ("Grade 10 Algebra Notes", "Teacher Silva", "Mathematics"),
            ("Newton's Laws Worksheet", "Mr. Perera", "Science"),
            ("Basic Computer Skills", "ICT Club", "ICT"),
        ];
        let mut created = Vec::with_capacity(SAMPLES.len());
        for (name, author, subject) in SAMPLES {
            let pdf = tiny_pdf(name);
            created.push(Resource {
                id: mint_id(&now),
                name: name.to_string(),
                author: author.to_string(),
                subject: subject.to_string(),
                uploader_id: uploader.id.clone(),
                uploader_name: uploader.name.clone(),
                download_count: rng.gen_range(0..10),
                size: 1024 * rng.gen_range(50..450),
                content_digest: content_digest(&pdf),
                created_at: now - Duration::milliseconds(rng.gen_range(0..86_400_000)),
            });
        }
        let count = created.len();
        created.append(&mut self.resources);
        self.resources = created;
        count
    }
}

fn canonical_subject(subject: &str) -> Result<&'static str, CatalogError> {
    SUBJECTS
        .iter()
        .copied()
        .find(|known| known.eq_ignore_ascii_case(subject.trim()))
        .ok_or_else(|| CatalogError::UnknownSubjectArea(subject.to_string()))
}

fn content_digest(bytes: &[u8]) -> String {
    let mut hasher = Blake2b256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Builds a minimal one-page PDF that prints `title`.
pub fn tiny_pdf(title: &str) -> Vec<u8> {
    let title: String = title.chars().filter(|c| !matches!(c, '(' | ')' | '\\')).collect();
    format!(
        "%PDF-1.4\n1 0 obj<</Type/Catalog/Pages 2 0 R>>endobj\n\
         2 0 obj<</Type/Pages/Count 1/Kids[3 0 R]>>endobj\n\
         3 0 obj<</Type/Page/Parent 2 0 R/MediaBox[0 0 200 200]/Contents 4 0 R\
         /Resources<</Font<</F1 5 0 R>>>>>>endobj\n\
         4 0 obj<</Length 55>>stream\nBT /F1 18 Tf 20 100 Td ({title}) Tj ET\nendstream endobj\n\
         5 0 obj<</Type/Font/Subtype/Type1/BaseFont/Helvetica>>endobj\n\
         trailer<</Size 6/Root 1 0 R>>\n%%EOF"
    )
    .into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_714_557_600, 0).unwrap()
    }

    fn uploader() -> User {
        User {
            id: "u1".into(),
            name: "Ayesha".into(),
            email: "a@example.com".into(),
            password_digest: String::new(),
            points: 0,
            created_at: now(),
        }
    }

    fn upload<'a>(name: &'a str, bytes: &'a [u8]) -> Upload<'a> {
        Upload {
            name,
            author: "Ayesha",
            subject: "science",
            bytes,
        }
    }

    #[test]
    fn upload_records_bookkeeping() {
        let mut catalog = Catalog::new();
        let pdf = tiny_pdf("Notes");
        let res = catalog.upload(&uploader(), upload("Notes", &pdf), now()).unwrap();
        assert_eq!(res.subject, "Science");
        assert_eq!(res.size, pdf.len() as u64);
        assert_eq!(res.content_digest.len(), 64);
        assert_eq!(res.download_count, 0);
        assert_eq!(res.uploader_id, "u1");
    }

    #[test]
    fn upload_validation() {
        let mut catalog = Catalog::new();
        let user = uploader();
        let pdf = tiny_pdf("x");
        assert_eq!(
            catalog.upload(&user, upload(" ", &pdf), now()),
            Err(CatalogError::MissingFields)
        );
        assert_eq!(
            catalog.upload(&user, upload("Doc", b"PK\x03\x04"), now()),
            Err(CatalogError::NotPdf)
        );
        let mut big = PDF_MAGIC.to_vec();
        big.resize(MAX_UPLOAD_BYTES as usize + 1, b' ');
        assert!(matches!(
            catalog.upload(&user, upload("Big", &big), now()),
            Err(CatalogError::TooLarge { .. })
        ));
        let mut bad_subject = upload("Doc", &pdf);
        bad_subject.subject = "Astrology";
        assert_eq!(
            catalog.upload(&user, bad_subject, now()),
            Err(CatalogError::UnknownSubjectArea("Astrology".into()))
        );
        assert!(catalog.resources().is_empty());
    }

    #[test]
    fn downloads_are_counted() {
        let mut catalog = Catalog::new();
        let pdf = tiny_pdf("Notes");
        let id = catalog
            .upload(&uploader(), upload("Notes", &pdf), now())
            .unwrap()
            .id
            .clone();
        catalog.download(&id).unwrap();
        assert_eq!(catalog.download(&id).unwrap().download_count, 2);
        assert_eq!(
            catalog.download("missing"),
            Err(CatalogError::UnknownResource("missing".into()))
        );
    }

    #[test]
    fn search_filters_and_orders_newest_first() {
        let mut catalog = Catalog::new();
        let user = uploader();
        let pdf = tiny_pdf("x");
        catalog.upload(&user, upload("Algebra I", &pdf), now()).unwrap();
        catalog
            .upload(&user, upload("Algebra II", &pdf), now() + Duration::seconds(5))
            .unwrap();
        let mut physics = upload("Physics", &pdf);
        physics.subject = "Mathematics";
        catalog.upload(&user, physics, now()).unwrap();

        let hits = catalog.search("ALGEBRA", None);
        let names: Vec<&str> = hits.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Algebra II", "Algebra I"]);
        assert_eq!(catalog.search("", Some("Mathematics")).len(), 1);
        assert_eq!(catalog.search("ayesha", None).len(), 3);
    }

    #[test]
    fn subject_filter_ignores_case() {
        let mut catalog = Catalog::new();
        let pdf = tiny_pdf("x");
        let mut algebra = upload("Algebra", &pdf);
        algebra.subject = "mathematics";
        let stored = catalog.upload(&uploader(), algebra, now()).unwrap().subject.clone();
        assert_eq!(stored, "Mathematics");
        assert_eq!(catalog.search("", Some("mathematics")).len(), 1);
        assert_eq!(catalog.search("", Some("MATHEMATICS")).len(), 1);
        assert!(catalog.search("", Some("science")).is_empty());
    }

    #[test]
    fn seeding_prepends_samples() {
        let mut catalog = Catalog::new();
        let user = uploader();
        let pdf = tiny_pdf("Mine");
        catalog.upload(&user, upload("Mine", &pdf), now()).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(catalog.seed_samples(&user, now(), &mut rng), 3);
        assert_eq!(catalog.resources().len(), 4);
        assert_eq!(catalog.resources()[3].name, "Mine");
        for res in &catalog.resources()[..3] {
            assert!(res.download_count < 10);
            assert!((50 * 1024..450 * 1024).contains(&res.size));
            assert!(res.created_at <= now());
        }
    }

    #[test]
    fn tiny_pdf_has_header_and_strips_parens() {
        let pdf = tiny_pdf("Notes (draft)");
        assert!(pdf.starts_with(PDF_MAGIC));
        let text = String::from_utf8(pdf).unwrap();
        assert!(text.contains("(Notes draft)"));
    }
}
