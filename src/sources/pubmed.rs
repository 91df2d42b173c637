//! PubMed research source implementation using E-utilities API.

use async_trait::async_trait;
use quick_xml::de::from_str;
use quick_xml::events::Event;
use quick_xml::{Reader, Writer};
use serde::Deserialize;

use super::{pause, Pacing, Source, SourceError};
use crate::models::{NormalizedRecord, PubMedArticle, SourceKind};
use crate::utils::HttpClient;

/// PubMed E-utilities API base URL
pub const PUBMED_BASE_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";

/// Result identifiers requested from esearch
pub const PUBMED_MAX_RESULTS: usize = 500;

/// IDs per efetch call; longer lists overflow the provider's URL limit
pub const PUBMED_BATCH_SIZE: usize = 20;

const MIN_YEAR: &str = "2018";
const MAX_YEAR: &str = "2023";

/// PubMed research source
///
/// Uses NCBI E-utilities: one esearch call for the topic, then efetch in
/// batches of [`PUBMED_BATCH_SIZE`] ids.
#[derive(Debug, Clone)]
pub struct PubMedSource {
    client: HttpClient,
    base_url: String,
    pacing: Pacing,
}

impl PubMedSource {
    /// Create a new PubMed source
    pub fn new(client: HttpClient, pacing: Pacing) -> Self {
        Self::with_base_url(client, pacing, PUBMED_BASE_URL)
    }

    /// Create against a different E-utilities host (for testing)
    pub fn with_base_url(client: HttpClient, pacing: Pacing, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            pacing,
        }
    }

    /// Build esearch query parameters
    fn search_params(topic: &str) -> Vec<(&'static str, String)> {
        vec![
            ("db", "pubmed".to_string()),
            ("term", topic.to_string()),
            ("retmax", PUBMED_MAX_RESULTS.to_string()),
            ("sort", "relevance".to_string()),
            ("datetype", "pdat".to_string()),
            ("mindate", MIN_YEAR.to_string()),
            ("maxdate", MAX_YEAR.to_string()),
            ("retmode", "xml".to_string()),
        ]
    }

    /// Build efetch query parameters for a batch of PubMed IDs
    fn fetch_params(ids: &[String]) -> Vec<(&'static str, String)> {
        vec![
            ("db", "pubmed".to_string()),
            ("id", ids.join(",")),
            ("rettype", "abstract".to_string()),
            ("retmode", "xml".to_string()),
        ]
    }

    /// Search for the ordered list of PubMed IDs matching the topic
    async fn search_ids(&self, topic: &str) -> Result<Vec<String>, SourceError> {
        let url = format!("{}/esearch.fcgi", self.base_url);
        let xml = self
            .client
            .get_text(&url, &Self::search_params(topic), "esearch")
            .await?;

        parse_search_response(&xml)
    }

    /// Fetch and parse one batch of articles
    async fn fetch_batch(&self, ids: &[String]) -> Result<Vec<PubMedArticle>, SourceError> {
        let url = format!("{}/efetch.fcgi", self.base_url);
        let xml = self
            .client
            .get_text(&url, &Self::fetch_params(ids), "efetch")
            .await?;

        Ok(parse_fetch_response(&xml))
    }
}

#[async_trait]
impl Source for PubMedSource {
    fn kind(&self) -> SourceKind {
        SourceKind::PubMedArticle
    }

    async fn fetch_topic(&self, topic: &str) -> Result<Vec<NormalizedRecord>, SourceError> {
        let ids = self.search_ids(topic).await?;
        tracing::info!("PubMed returned {} ids for '{}'", ids.len(), topic);

        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut records = Vec::with_capacity(ids.len());
        for (index, batch) in ids.chunks(PUBMED_BATCH_SIZE).enumerate() {
            if index > 0 {
                pause(self.pacing.pubmed_batch_delay).await;
            }

            match self.fetch_batch(batch).await {
                Ok(articles) => {
                    tracing::debug!(
                        "PubMed batch {} for '{}': {} of {} articles parsed",
                        index + 1,
                        topic,
                        articles.len(),
                        batch.len()
                    );
                    records.extend(articles.into_iter().map(NormalizedRecord::from));
                }
                Err(e) => {
                    tracing::warn!(
                        "PubMed batch {} for '{}' failed, skipping {} ids: {}",
                        index + 1,
                        topic,
                        batch.len(),
                        e
                    );
                }
            }
        }

        Ok(records)
    }
}

/// Parse E-utilities search response XML
fn parse_search_response(xml: &str) -> Result<Vec<String>, SourceError> {
    #[derive(Debug, Deserialize)]
    #[allow(non_snake_case)]
    struct ESearchResult {
        IdList: Option<IdList>,
    }

    #[derive(Debug, Deserialize)]
    struct IdList {
        #[serde(rename = "Id", default)]
        ids: Vec<String>,
    }

    let result: ESearchResult = from_str(xml)
        .map_err(|e| SourceError::Parse(format!("Failed to parse PubMed search XML: {}", e)))?;

    Ok(result.IdList.map(|list| list.ids).unwrap_or_default())
}

/// Parse E-utilities fetch response XML
///
/// Each `<PubmedArticle>` is deserialized on its own so that one malformed
/// entry only costs that entry.
fn parse_fetch_response(xml: &str) -> Vec<PubMedArticle> {
    split_articles(xml)
        .into_iter()
        .enumerate()
        .filter_map(|(index, chunk)| {
            let parsed = flatten_inline_markup(chunk)
                .and_then(|article| from_str::<RawArticle>(&article).map_err(SourceError::from));

            match parsed {
                Ok(raw) => raw.into_article(),
                Err(e) => {
                    tracing::warn!("Skipping unparseable PubMed article #{}: {}", index + 1, e);
                    None
                }
            }
        })
        .collect()
}

/// Slice the raw XML of every top-level `<PubmedArticle>` element
///
/// End tag names are not checked here; a mismatched tag is left for the
/// per-article parse to reject. After a reader error the partial article is
/// dropped and scanning resumes at the next `<PubmedArticle>`.
fn split_articles(xml: &str) -> Vec<&str> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().check_end_names = false;

    let mut chunks = Vec::new();
    let mut start: Option<usize> = None;
    let mut depth = 0usize;

    loop {
        let before = reader.buffer_position() as usize;
        match reader.read_event() {
            Ok(Event::Start(e)) if e.name().as_ref() == b"PubmedArticle" => {
                if depth == 0 {
                    start = Some(before);
                }
                depth += 1;
            }
            Ok(Event::End(e)) if e.name().as_ref() == b"PubmedArticle" => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    if let Some(begin) = start.take() {
                        chunks.push(&xml[begin..reader.buffer_position() as usize]);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(
                    "Malformed PubMed fetch XML after {} articles: {}",
                    chunks.len(),
                    e
                );
                start = None;
                depth = 0;
                if reader.buffer_position() as usize <= before {
                    break;
                }
            }
        }
    }

    chunks
}

/// Elements holding free text that may carry inline markup (`<i>`, `<sub>`, ...)
const MIXED_CONTENT: [&[u8]; 2] = [b"ArticleTitle", b"AbstractText"];

/// Rewrite one article with the markup inside titles and abstracts removed,
/// keeping the text it wrapped
fn flatten_inline_markup(article: &str) -> Result<String, SourceError> {
    let mut reader = Reader::from_str(article);
    let mut writer = Writer::new(Vec::with_capacity(article.len()));
    // Nesting below the current mixed-content element, when inside one
    let mut inline_depth: Option<usize> = None;

    loop {
        let event = reader.read_event()?;
        match (&event, inline_depth) {
            (Event::Eof, _) => break,
            (Event::Start(_), Some(depth)) => {
                inline_depth = Some(depth + 1);
                continue;
            }
            (Event::End(_), Some(depth)) if depth > 0 => {
                inline_depth = Some(depth - 1);
                continue;
            }
            (Event::Empty(_), Some(_)) => continue,
            (Event::End(_), Some(_)) => inline_depth = None,
            (Event::Start(e), None) if MIXED_CONTENT.contains(&e.name().as_ref()) => {
                inline_depth = Some(0);
            }
            _ => {}
        }

        writer
            .write_event(event)
            .map_err(|e| SourceError::Parse(format!("XML: {}", e)))?;
    }

    String::from_utf8(writer.into_inner())
        .map_err(|e| SourceError::Parse(format!("XML: {}", e)))
}

// ===== PubMed XML Types =====

#[derive(Debug, Deserialize)]
struct RawArticle {
    #[serde(rename = "MedlineCitation")]
    citation: MedlineCitation,
    #[serde(rename = "PubmedData")]
    pubmed_data: Option<PubmedData>,
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct MedlineCitation {
    PMID: Option<Text>,
    Article: Option<Article>,
}

#[derive(Debug, Default, Deserialize)]
struct Text {
    #[serde(rename = "$text", default)]
    value: String,
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct Article {
    Journal: Option<Journal>,
    ArticleTitle: Option<Text>,
    Abstract: Option<Abstract>,
    AuthorList: Option<AuthorList>,
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct Journal {
    Title: Option<String>,
    JournalIssue: Option<JournalIssue>,
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct JournalIssue {
    PubDate: Option<PubDate>,
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct PubDate {
    Year: Option<String>,
    Month: Option<String>,
    Day: Option<String>,
    MedlineDate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Abstract {
    #[serde(rename = "AbstractText", default)]
    paragraphs: Vec<Text>,
}

#[derive(Debug, Deserialize)]
struct AuthorList {
    #[serde(rename = "Author", default)]
    authors: Vec<Author>,
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct Author {
    LastName: Option<String>,
    ForeName: Option<String>,
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct PubmedData {
    ArticleIdList: Option<ArticleIdList>,
}

#[derive(Debug, Deserialize)]
struct ArticleIdList {
    #[serde(rename = "ArticleId", default)]
    ids: Vec<ArticleId>,
}

#[derive(Debug, Deserialize)]
struct ArticleId {
    #[serde(rename = "@IdType", default)]
    id_type: String,
    #[serde(rename = "$text", default)]
    value: String,
}

impl Author {
    /// "LastName ForeName", or `None` when the entry has neither
    fn display_name(&self) -> Option<String> {
        let parts: Vec<&str> = [self.LastName.as_deref(), self.ForeName.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();

        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }
}

impl PubDate {
    fn display(&self) -> String {
        let tokens: Vec<&str> = [self.Year.as_deref(), self.Month.as_deref(), self.Day.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();

        if tokens.is_empty() {
            self.MedlineDate.clone().unwrap_or_default()
        } else {
            tokens.join(" ")
        }
    }
}

impl RawArticle {
    /// Normalize, dropping articles without a PMID or a title
    fn into_article(self) -> Option<PubMedArticle> {
        let pmid = self
            .citation
            .PMID
            .map(|p| p.value.trim().to_string())
            .unwrap_or_default();

        let article = self.citation.Article;

        let title = article
            .as_ref()
            .and_then(|a| a.ArticleTitle.as_ref())
            .map(|t| t.value.trim().to_string())
            .unwrap_or_default();

        if pmid.is_empty() || title.is_empty() {
            tracing::debug!("Discarding PubMed article without id or title (pmid '{}')", pmid);
            return None;
        }

        let mut record = PubMedArticle::new(pmid, title);

        if let Some(article) = article {
            record.abstract_text = article
                .Abstract
                .map(|ab| {
                    ab.paragraphs
                        .iter()
                        .map(|p| p.value.trim())
                        .filter(|p| !p.is_empty())
                        .collect::<Vec<_>>()
                        .join(" ")
                })
                .unwrap_or_default();

            record.authors = article
                .AuthorList
                .map(|list| {
                    list.authors
                        .iter()
                        .filter_map(|author| {
                            let name = author.display_name();
                            if name.is_none() {
                                tracing::debug!(
                                    "Skipping author without name in PubMed article {}",
                                    record.pmid
                                );
                            }
                            name
                        })
                        .collect()
                })
                .unwrap_or_default();

            if let Some(journal) = article.Journal {
                record.journal = journal.Title.unwrap_or_default();
                record.publication_date = journal
                    .JournalIssue
                    .and_then(|issue| issue.PubDate)
                    .map(|date| date.display())
                    .unwrap_or_default();
            }
        }

        record.doi = self
            .pubmed_data
            .and_then(|data| data.ArticleIdList)
            .and_then(|list| list.ids.into_iter().find(|id| id.id_type == "doi"))
            .map(|id| id.value.trim().to_string())
            .filter(|doi| !doi.is_empty());

        Some(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_FETCH: &str = r#"<?xml version="1.0" ?>
<!DOCTYPE PubmedArticleSet PUBLIC "-//NLM//DTD PubMedArticle, 1st January 2023//EN" "https://dtd.nlm.nih.gov/ncbi/pubmed/out/pubmed_230101.dtd">
<PubmedArticleSet>
  <PubmedArticle>
    <MedlineCitation Status="MEDLINE" Owner="NLM">
      <PMID Version="1">111</PMID>
      <Article PubModel="Print">
        <Journal>
          <ISSN IssnType="Electronic">1234-5678</ISSN>
          <JournalIssue CitedMedium="Internet">
            <Volume>12</Volume>
            <PubDate>
              <Year>2021</Year>
              <Month>Mar</Month>
              <Day>04</Day>
            </PubDate>
          </JournalIssue>
          <Title>Journal of Telemedicine</Title>
        </Journal>
        <ArticleTitle>Video visits in rural clinics.</ArticleTitle>
        <Abstract>
          <AbstractText Label="BACKGROUND">Access is limited.</AbstractText>
          <AbstractText Label="RESULTS">Visits doubled.</AbstractText>
        </Abstract>
        <AuthorList CompleteYN="Y">
          <Author ValidYN="Y">
            <LastName>Smith</LastName>
            <ForeName>Jane</ForeName>
            <Initials>J</Initials>
          </Author>
          <Author ValidYN="Y">
            <LastName>Doe</LastName>
            <ForeName>John</ForeName>
          </Author>
          <Author ValidYN="Y">
            <CollectiveName>Telehealth Study Group</CollectiveName>
          </Author>
        </AuthorList>
      </Article>
    </MedlineCitation>
    <PubmedData>
      <ArticleIdList>
        <ArticleId IdType="pubmed">111</ArticleId>
        <ArticleId IdType="doi">10.1000/tele.111</ArticleId>
      </ArticleIdList>
    </PubmedData>
  </PubmedArticle>
  <PubmedArticle>
    <MedlineCitation>
      <PMID Version="1">222</PMID>
      <Article>
        <Journal>
          <JournalIssue>
            <PubDate>
              <MedlineDate>2019 Nov-Dec</MedlineDate>
            </PubDate>
          </JournalIssue>
          <Title>Health Affairs</Title>
        </Journal>
        <ArticleTitle>Costs of remote monitoring.</ArticleTitle>
      </Article>
    </MedlineCitation>
  </PubmedArticle>
  <PubmedArticle>
    <MedlineCitation>
      <PMID Version="1">333</PMID>
      <Article>
        <Journal><Title>Untitled Quarterly</Title></Journal>
      </Article>
    </MedlineCitation>
  </PubmedArticle>
</PubmedArticleSet>"#;

    #[test]
    fn test_search_params() {
        let params = PubMedSource::search_params("Telehealth healthcare");

        assert!(params.contains(&("term", "Telehealth healthcare".to_string())));
        assert!(params.contains(&("retmax", "500".to_string())));
        assert!(params.contains(&("sort", "relevance".to_string())));
        assert!(params.contains(&("datetype", "pdat".to_string())));
        assert!(params.contains(&("mindate", "2018".to_string())));
        assert!(params.contains(&("maxdate", "2023".to_string())));
    }

    #[test]
    fn test_fetch_params() {
        let ids = vec!["1".to_string(), "2".to_string(), "3".to_string()];
        let params = PubMedSource::fetch_params(&ids);

        assert!(params.contains(&("id", "1,2,3".to_string())));
        assert!(params.contains(&("rettype", "abstract".to_string())));
    }

    #[test]
    fn test_parse_search_response() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8" ?>
<eSearchResult>
  <Count>2</Count><RetMax>2</RetMax><RetStart>0</RetStart>
  <IdList>
    <Id>111</Id>
    <Id>222</Id>
  </IdList>
</eSearchResult>"#;

        assert_eq!(parse_search_response(xml).unwrap(), vec!["111", "222"]);
    }

    #[test]
    fn test_parse_empty_search_response() {
        let xml = r#"<eSearchResult><Count>0</Count><IdList></IdList></eSearchResult>"#;
        assert!(parse_search_response(xml).unwrap().is_empty());
    }

    #[test]
    fn test_parse_fetch_response() {
        let articles = parse_fetch_response(SAMPLE_FETCH);

        // 333 has no title and is discarded
        assert_eq!(articles.len(), 2);

        let first = &articles[0];
        assert_eq!(first.pmid, "111");
        assert_eq!(first.title, "Video visits in rural clinics.");
        assert_eq!(first.abstract_text, "Access is limited. Visits doubled.");
        assert_eq!(first.authors, vec!["Smith Jane", "Doe John"]);
        assert_eq!(first.journal, "Journal of Telemedicine");
        assert_eq!(first.publication_date, "2021 Mar 04");
        assert_eq!(first.doi.as_deref(), Some("10.1000/tele.111"));

        let second = &articles[1];
        assert_eq!(second.pmid, "222");
        assert_eq!(second.publication_date, "2019 Nov-Dec");
        assert_eq!(second.abstract_text, "");
        assert!(second.authors.is_empty());
        assert_eq!(second.doi, None);
    }

    #[test]
    fn test_split_articles_ignores_article_set() {
        let chunks = split_articles(SAMPLE_FETCH);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.starts_with("<PubmedArticle>")));
        assert!(chunks.iter().all(|c| c.ends_with("</PubmedArticle>")));
    }

    #[test]
    fn test_author_uses_own_forename() {
        let xml = r#"<PubmedArticleSet><PubmedArticle><MedlineCitation>
<PMID>9</PMID><Article><ArticleTitle>T</ArticleTitle><AuthorList>
<Author><LastName>Alpha</LastName><ForeName>Ann</ForeName></Author>
<Author><LastName>Beta</LastName></Author>
<Author><ForeName>Cy</ForeName></Author>
<Author><Initials>Z</Initials></Author>
</AuthorList></Article></MedlineCitation></PubmedArticle></PubmedArticleSet>"#;

        let articles = parse_fetch_response(xml);
        assert_eq!(articles[0].authors, vec!["Alpha Ann", "Beta", "Cy"]);
    }

    #[test]
    fn test_mismatched_tags_only_cost_that_article() {
        let mut xml = String::from("<PubmedArticleSet>");
        for i in 1..=20 {
            let title = if i == 7 {
                "<ArticleTitle>Broken</ArticleTitl>".to_string()
            } else {
                format!("<ArticleTitle>Title {i}</ArticleTitle>")
            };
            xml.push_str(&format!(
                "<PubmedArticle><MedlineCitation><PMID>{i}</PMID><Article>{title}</Article>\
                 </MedlineCitation></PubmedArticle>"
            ));
        }
        xml.push_str("</PubmedArticleSet>");

        let articles = parse_fetch_response(&xml);
        let pmids: Vec<&str> = articles.iter().map(|a| a.pmid.as_str()).collect();

        assert_eq!(articles.len(), 19);
        assert!(!pmids.contains(&"7"));
        assert_eq!(pmids.last(), Some(&"20"));
    }

    #[test]
    fn test_inline_markup_in_title_and_abstract() {
        let xml = r#"<PubmedArticleSet>
<PubmedArticle><MedlineCitation><PMID>42</PMID><Article>
<ArticleTitle>Effect of <i>SARS-CoV-2</i> on lung tissue.</ArticleTitle>
<Abstract>
<AbstractText Label="METHODS">CO<sub>2</sub> levels rose by 10<sup>3</sup>.</AbstractText>
<AbstractText>Uses <b>bold</b> terms<br/> and <i><b>nested</b></i> ones.</AbstractText>
</Abstract>
<AuthorList><Author><LastName>Ng</LastName><ForeName>Al</ForeName></Author></AuthorList>
</Article></MedlineCitation></PubmedArticle>
<PubmedArticle><MedlineCitation><PMID>43</PMID><Article>
<ArticleTitle>Plain title</ArticleTitle>
</Article></MedlineCitation></PubmedArticle>
</PubmedArticleSet>"#;

        let articles = parse_fetch_response(xml);

        assert_eq!(articles.len(), 2);
        assert_eq!(articles[0].title, "Effect of SARS-CoV-2 on lung tissue.");
        assert_eq!(
            articles[0].abstract_text,
            "CO2 levels rose by 103. Uses bold terms and nested ones."
        );
        assert_eq!(articles[0].authors, vec!["Ng Al"]);
        assert_eq!(articles[1].title, "Plain title");
    }

    #[test]
    fn test_unparseable_article_is_skipped() {
        let mut xml = String::from("<PubmedArticleSet>");
        for i in 1..=20 {
            if i == 7 {
                // no MedlineCitation at all
                xml.push_str("<PubmedArticle><PubmedData></PubmedData></PubmedArticle>");
            } else {
                xml.push_str(&format!(
                    "<PubmedArticle><MedlineCitation><PMID>{i}</PMID><Article>\
                     <ArticleTitle>Title {i}</ArticleTitle></Article></MedlineCitation>\
                     </PubmedArticle>"
                ));
            }
        }
        xml.push_str("</PubmedArticleSet>");

        let articles = parse_fetch_response(&xml);
        assert_eq!(articles.len(), 19);
        assert!(articles.iter().all(|a| a.pmid != "7"));
    }
}
