// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! The Request Dispatcher (spec §4.4): the one place that owns an upstream
//! call end-to-end — acquiring a ready account from the pool, driving
//! [`chatgate_transport::Transport`] with 429-retry, parsing the response
//! through [`chatgate_transport::PayloadParser`], and reporting the right
//! outcome back to the pool so rotation and quota tracking stay correct.
//!
//! Every dialect module builds its own [`chatgate_proto::InternalRequest`];
//! this crate never looks at dialect-specific wire shapes, only at the
//! internal protocol and the upstream's raw JSON/SSE response.

use std::sync::Arc;

use chatgate_accounts::AccountPool;
use chatgate_cache::{ObjectPool, SignatureCache, ToolNameCache};
use chatgate_proto::{Account, AccountOutcome, GatewayError, InternalRequest, StreamEvent};
use chatgate_transport::{PayloadParser, StreamFramer, Transport};
use futures::StreamExt;
use tokio::sync::{mpsc, oneshot};

use crate::retry::{retry_on_rate_limit, RetryConfig};

/// The literal Google returns when a request's token count exceeds the
/// target model's context window. Matched as a substring, not parsed as
/// structured error detail — the upstream gives this case the same 403
/// status as every other permission failure, and the message body is the
/// only signal distinguishing the two causes.
const CONTEXT_OVERFLOW_MARKER: &str = "exceeds the maximum number of tokens";

#[derive(Debug, Clone)]
pub struct ApiEndpoints {
    pub stream_url: String,
    pub no_stream_url: String,
}

/// Owns the plumbing a single upstream call needs: the credential pool, the
/// HTTP transport, the retry policy, the signature cache, and the
/// endpoints to call. One instance is shared process-wide.
pub struct Dispatcher {
    accounts: Arc<AccountPool>,
    transport: Transport,
    retry: RetryConfig,
    endpoints: ApiEndpoints,
    line_buffers: Arc<ObjectPool<Vec<u8>>>,
    signatures: Arc<SignatureCache>,
    tool_names: Arc<ToolNameCache>,
}

impl Dispatcher {
    pub fn new(
        accounts: Arc<AccountPool>,
        transport: Transport,
        retry: RetryConfig,
        endpoints: ApiEndpoints,
        line_buffers: Arc<ObjectPool<Vec<u8>>>,
        signatures: Arc<SignatureCache>,
        tool_names: Arc<ToolNameCache>,
    ) -> Self {
        Self { accounts, transport, retry, endpoints, line_buffers, signatures, tool_names }
    }

    /// Acquires a ready account with its project id resolved (`account.project_id`
    /// is always `Some` on success). Rotates to the next candidate when
    /// project-id resolution rejects the account's token outright; bounded
    /// by the pool size so a fully broken fleet fails rather than spinning.
    ///
    /// Exposed publicly so a caller that needs the account *before*
    /// building its [`InternalRequest`] — e.g. an inbound dialect adapter
    /// that partitions its signature/tool-name caches by `account.session_id`
    /// (spec §3/§4.2) — can acquire once and reuse the same account for
    /// both translation and dispatch via [`Self::dispatch_unary_with`] /
    /// [`Self::dispatch_streaming_with`], rather than dispatch silently
    /// picking a second, unrelated account.
    pub async fn acquire_account(&self) -> Result<Account, GatewayError> {
        let pool_size = self.accounts.snapshot().await.len().max(1);
        for _ in 0..pool_size {
            let Some(account) = self.accounts.acquire_ready().await? else {
                return Err(GatewayError::Internal("no accounts available".into()));
            };
            match self.accounts.ensure_project_id(&account.id).await {
                Ok(project_id) => {
                    let mut account = account;
                    account.project_id = Some(project_id);
                    return Ok(account);
                }
                Err(GatewayError::Auth(reason)) => {
                    tracing::warn!(account_id = %account.id, %reason, "disabling account: project id lookup rejected");
                    self.accounts.release(&account, AccountOutcome::AuthInvalid).await;
                }
                Err(other) => return Err(other),
            }
        }
        Err(GatewayError::Internal("no accounts available".into()))
    }

    /// Classifies a 403 per spec §4.4/§7 and reports the matching outcome
    /// to the pool. Every other non-2xx status is a plain transport error:
    /// the account is left usable (spec §7: "transient transport errors
    /// bubble to Dispatcher"), not disabled or marked exhausted.
    async fn handle_upstream_error(&self, account: &Account, status: u16, body: String) -> GatewayError {
        if status == 403 {
            if body.contains(CONTEXT_OVERFLOW_MARKER) {
                self.accounts.release(account, AccountOutcome::Ok).await;
                return GatewayError::ContextOverflow(body);
            }
            self.accounts.release(account, AccountOutcome::AuthInvalid).await;
            return GatewayError::Auth("no usage permission".into());
        }
        self.accounts.release(account, AccountOutcome::TransportError).await;
        GatewayError::Upstream { status, body }
    }

    /// Drives one non-streaming call: acquire, call, parse, release. The
    /// unary response already carries `finishReason` and usage in the same
    /// payload, so `PayloadParser` runs exactly once over it.
    pub async fn dispatch_unary(&self, request: InternalRequest) -> Result<Vec<StreamEvent>, GatewayError> {
        let account = self.acquire_account().await?;
        self.dispatch_unary_with(account, request).await
    }

    /// Like [`Self::dispatch_unary`], but against an account the caller
    /// already acquired via [`Self::acquire_account`] — used by the inbound
    /// HTTP routes, which need the account's `session_id`/`project_id`
    /// before they can even build `request` (spec §4.2).
    pub async fn dispatch_unary_with(
        &self,
        account: Account,
        mut request: InternalRequest,
    ) -> Result<Vec<StreamEvent>, GatewayError> {
        request.project = account.project_id.clone().unwrap_or_default();
        let result = retry_on_rate_limit(&self.retry, || {
            self.transport.unary(&self.endpoints.no_stream_url, &account.access_token, &request)
        })
        .await;

        let body = match result {
            Ok(body) => body,
            Err(GatewayError::Upstream { status, body }) => {
                return Err(self.handle_upstream_error(&account, status, body).await);
            }
            Err(other) => {
                self.accounts.release(&account, AccountOutcome::TransportError).await;
                return Err(other);
            }
        };

        let mut parser = PayloadParser::new(request.request.session_id.clone(), request.model.clone());
        let events = parser.parse(&body, &self.signatures, &self.tool_names).await;
        self.accounts.release(&account, AccountOutcome::Ok).await;
        Ok(events)
    }

    /// Drives one streaming call, sending each decoded [`StreamEvent`] to
    /// `events_tx` as it arrives. `cancel` fires when the client
    /// disconnects: the upstream byte read is aborted immediately (spec
    /// §4.4) and the account is released as `Ok` rather than
    /// `QuotaExhausted`, since an aborted stream carries no signal about
    /// the account's quota at all.
    ///
    /// The initial connect (including its own 429 retry) happens before
    /// this function starts forwarding events; a failure there is returned
    /// directly rather than sent down `events_tx`.
    pub async fn dispatch_streaming(
        &self,
        request: InternalRequest,
        events_tx: mpsc::Sender<StreamEvent>,
        cancel: oneshot::Receiver<()>,
    ) -> Result<(), GatewayError> {
        let account = self.acquire_account().await?;
        self.dispatch_streaming_with(account, request, events_tx, cancel).await
    }

    /// Like [`Self::dispatch_streaming`], but against an account the caller
    /// already acquired via [`Self::acquire_account`]; see
    /// [`Self::dispatch_unary_with`] for why the HTTP routes need this.
    pub async fn dispatch_streaming_with(
        &self,
        account: Account,
        mut request: InternalRequest,
        events_tx: mpsc::Sender<StreamEvent>,
        mut cancel: oneshot::Receiver<()>,
    ) -> Result<(), GatewayError> {
        if cancel.try_recv().is_ok() {
            return Err(GatewayError::Cancelled);
        }

        request.project = account.project_id.clone().unwrap_or_default();
        let session_id = request.request.session_id.clone();
        let model = request.model.clone();

        let connect = retry_on_rate_limit(&self.retry, || {
            self.transport.stream(&self.endpoints.stream_url, &account.access_token, &request)
        })
        .await;

        let (_status, mut byte_stream) = match connect {
            Ok(pair) => pair,
            Err(GatewayError::Upstream { status, body }) => {
                return Err(self.handle_upstream_error(&account, status, body).await);
            }
            Err(other) => {
                self.accounts.release(&account, AccountOutcome::TransportError).await;
                return Err(other);
            }
        };

        let mut framer = StreamFramer::new(self.line_buffers.clone()).await;
        let mut parser = PayloadParser::new(session_id, model);
        let outcome = 'outer: loop {
            let chunk = tokio::select! {
                biased;
                _ = &mut cancel => break 'outer Ok(AccountOutcome::Ok),
                chunk = byte_stream.next() => chunk,
            };
            match chunk {
                Some(Ok(bytes)) => {
                    for payload in framer.push(&bytes) {
                        let events = parser.parse(&payload, &self.signatures, &self.tool_names).await;
                        let is_done = events.iter().any(|e| matches!(e, StreamEvent::Done { .. }));
                        for event in events {
                            if events_tx.send(event).await.is_err() {
                                // Client dropped its receiver without going through
                                // the cancellation channel; treat the same as
                                // cancellation rather than as an upstream problem.
                                break 'outer Ok(AccountOutcome::Ok);
                            }
                        }
                        if is_done {
                            break 'outer Ok(AccountOutcome::Ok);
                        }
                    }
                }
                Some(Err(err)) => break 'outer Err(GatewayError::Internal(format!("stream read failed: {err}"))),
                None => break 'outer Ok(AccountOutcome::Ok),
            }
        };

        framer.finish().await;
        match outcome {
            Ok(account_outcome) => {
                self.accounts.release(&account, account_outcome).await;
                Ok(())
            }
            Err(err) => {
                self.accounts.release(&account, AccountOutcome::TransportError).await;
                Err(err)
            }
        }
    }
}
