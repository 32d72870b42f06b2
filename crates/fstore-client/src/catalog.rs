//! List, delete, and word statistics on the `/files` resource.

use fstore_core::protocol::{
    Action, FileDeletionResponse, FileList, FileNameErrorPair, WordCountPair, WordCountResponse,
    ACTION_PARAM,
};

use crate::error::ClientError;
use crate::StoreClient;

impl StoreClient {
    /// Names of all stored files, sorted by the server.
    ///
    /// Calls `GET /files`.
    pub async fn list(&self) -> Result<Vec<String>, ClientError> {
        let list: FileList = self
            .send_json("GET /files", || self.http.get(self.files_url.clone()))
            .await?;
        Ok(list.files)
    }

    /// Delete `names`. Returns the names the server could not delete, each
    /// with its reason; an empty result means every name was removed.
    ///
    /// Calls `DELETE /files`.
    pub async fn delete(&self, names: &[String]) -> Result<Vec<FileNameErrorPair>, ClientError> {
        let body = FileList {
            files: names.to_vec(),
        };
        let resp: FileDeletionResponse = self
            .send_json("DELETE /files", || {
                self.http.delete(self.files_url.clone()).json(&body)
            })
            .await?;
        Ok(resp.unsuccessful_file_names)
    }

    /// Total word count across stored files.
    ///
    /// Calls `GET /files?action=wc`; the server answers in plain text.
    pub async fn word_count(&self) -> Result<u64, ClientError> {
        let endpoint = "GET /files?action=wc";
        let text = self
            .send(endpoint, || self.action_get(Action::WordCount))
            .await?
            .text()
            .await
            .map_err(|e| ClientError::Deserialization {
                endpoint: endpoint.into(),
                source: e,
            })?;
        text.trim().parse().map_err(|_| ClientError::UnexpectedBody {
            endpoint: endpoint.into(),
            body: text,
        })
    }

    /// The server's most frequent words, highest count first.
    ///
    /// Calls `GET /files?action=freq-words`.
    pub async fn frequent_words(&self) -> Result<Vec<WordCountPair>, ClientError> {
        let resp: WordCountResponse = self
            .send_json("GET /files?action=freq-words", || {
                self.action_get(Action::FreqWords)
            })
            .await?;
        Ok(resp.word_count_pairs)
    }

    fn action_get(&self, action: Action) -> reqwest::RequestBuilder {
        self.http
            .get(self.files_url.clone())
            .query(&[(ACTION_PARAM, action.as_str())])
    }
}
