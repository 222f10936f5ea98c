//! IMAP implementation of the mailbox client.

use std::fmt;

use async_imap::Session;
use async_native_tls::TlsConnector;
use async_trait::async_trait;
use futures_util::io::{AsyncRead, AsyncWrite};
use log::{debug, info, warn};

use crate::config::{Account, ImapSettings};

use super::error::{EmailError, Result};
use super::parser::InternalDate;
use super::session::{MailboxConnector, MailboxSession};

/// Type alias for the underlying async stream (using async-std compatible TcpStream).
type AsyncTcpStream = async_io::Async<std::net::TcpStream>;

/// Type alias for the TLS stream used by the IMAP session.
type TlsStream = async_native_tls::TlsStream<AsyncTcpStream>;

/// Opens IMAP sessions against a single destination server.
#[derive(Debug, Clone)]
pub struct ImapConnector {
    settings: ImapSettings,
}

impl ImapConnector {
    /// Creates a connector for the given server settings.
    ///
    /// Plain-text connections are refused: account secrets would otherwise
    /// travel unencrypted.
    pub fn new(settings: ImapSettings) -> Result<Self> {
        if !settings.use_tls {
            return Err(EmailError::ConfigError(
                "TLS is required for secure email connections".to_string(),
            ));
        }
        Ok(Self { settings })
    }

    pub fn settings(&self) -> &ImapSettings {
        &self.settings
    }

    async fn open_stream(&self) -> Result<TlsStream> {
        let addr = format!("{}:{}", self.settings.host, self.settings.port);
        debug!("Connecting to IMAP server at {}", addr);

        let socket_addr = tokio::net::lookup_host(&addr)
            .await
            .map_err(|e| EmailError::ConnectionFailed(format!("{}: {}", addr, e)))?
            .next()
            .ok_or_else(|| EmailError::ConnectionFailed(format!("{}: no address found", addr)))?;

        let tcp_stream = AsyncTcpStream::connect(socket_addr)
            .await
            .map_err(|e| EmailError::ConnectionFailed(format!("{}: {}", addr, e)))?;

        let tls = TlsConnector::new();
        let tls_stream = tls.connect(&self.settings.host, tcp_stream).await?;
        Ok(tls_stream)
    }
}

#[async_trait]
impl MailboxConnector for ImapConnector {
    async fn connect(&self, account: &Account, folder: &str) -> Result<Box<dyn MailboxSession>> {
        let stream = self.open_stream().await?;
        let client = async_imap::Client::new(stream);

        let mut session = client
            .login(account.identifier(), account.secret())
            .await
            .map_err(|(e, _)| EmailError::AuthenticationFailed(e.to_string()))?;

        if let Err(e) = session.select(folder).await {
            // Best effort; the select failure is what gets reported.
            let _ = session.logout().await;
            return Err(select_failure(folder, e));
        }

        info!(
            "Opened IMAP session for {} on {}",
            account.identifier(),
            self.settings.host
        );
        Ok(Box::new(ImapSession {
            session: Some(session),
            account: account.identifier().to_string(),
        }))
    }
}

/// Maps a failed SELECT: a tagged `NO` means the folder is unavailable.
fn select_failure(folder: &str, error: async_imap::error::Error) -> EmailError {
    match error {
        async_imap::error::Error::No(message) => {
            debug!("SELECT {} refused: {}", folder, message);
            EmailError::FolderNotFound(folder.to_string())
        }
        other => EmailError::ProtocolError(other.to_string()),
    }
}

/// A logged-in IMAP session with a selected folder.
pub struct ImapSession<S = TlsStream>
where
    S: AsyncRead + AsyncWrite + Unpin + fmt::Debug,
{
    session: Option<Session<S>>,
    account: String,
}

#[async_trait]
impl<S> MailboxSession for ImapSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin + fmt::Debug + Send,
{
    async fn append(
        &mut self,
        folder: &str,
        flags: Option<&str>,
        internal_date: &InternalDate,
        content: &[u8],
    ) -> Result<()> {
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| EmailError::ConnectionFailed("Not connected".to_string()))?;

        let date = internal_date.to_append_argument();
        session
            .append(folder, flags, Some(date.as_str()), content)
            .await
            .map_err(|e| EmailError::AppendRejected(e.to_string()))
    }

    async fn logout(&mut self) -> Result<()> {
        if let Some(mut session) = self.session.take() {
            debug!("Logging out IMAP session for {}", self.account);
            session
                .logout()
                .await
                .map_err(|e| EmailError::ProtocolError(e.to_string()))?;
        }
        Ok(())
    }
}

impl<S> Drop for ImapSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin + fmt::Debug,
{
    fn drop(&mut self) {
        if self.session.is_some() {
            warn!(
                "IMAP session for {} dropped without logout - connection will be closed",
                self.account
            );
        }
    }
}
