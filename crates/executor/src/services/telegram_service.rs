use std::fmt::Write as _;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use common::actors::{Actor, ActorType, ControlMessage};
use common::clients::Notifier;
use common::errors::NetworkError;
use common::models::{AggregatedSignal, Direction};
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::command_service::{AdminCommand, CommandService, reply_for_error};

/// Delivers alerts to the admin chat.
#[derive(Clone)]
pub struct TelegramNotifier {
    bot: Bot,
    chat_id: ChatId,
}

impl TelegramNotifier {
    pub fn new(bot: Bot, chat_id: i64) -> Self {
        Self {
            bot,
            chat_id: ChatId(chat_id),
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send_signal_alert(
        &self,
        signal: &AggregatedSignal,
        confirm_action_id: &str,
        cancel_action_id: &str,
    ) -> Result<(), NetworkError> {
        self.bot
            .send_message(self.chat_id, format_alert(signal))
            .reply_markup(alert_keyboard(confirm_action_id, cancel_action_id))
            .await
            .map(|_| ())
            .map_err(|e| NetworkError::Request(e.to_string()))
    }

    async fn send_text(&self, message: &str) -> Result<(), NetworkError> {
        self.bot
            .send_message(self.chat_id, message)
            .await
            .map(|_| ())
            .map_err(|e| NetworkError::Request(e.to_string()))
    }
}

pub fn format_alert(signal: &AggregatedSignal) -> String {
    let mut text = format!(
        "{} SIGNAL: {}\nPrice: {:.4}\nConfidence: {:.1}%\n",
        signal.direction,
        signal.symbol,
        signal.reference_price,
        signal.confidence * 100.0
    );
    for vote in &signal.votes {
        if vote.direction != Direction::Hold {
            let _ = writeln!(text, "  {}: {} ({:.2})", vote.strategy, vote.direction, vote.strength);
        }
    }
    text
}

pub fn alert_keyboard(confirm_action_id: &str, cancel_action_id: &str) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback("Confirm", confirm_action_id.to_string()),
        InlineKeyboardButton::callback("Cancel", cancel_action_id.to_string()),
    ]])
}

async fn on_command(bot: Bot, msg: Message, cmd: AdminCommand, commands: Arc<CommandService>) -> ResponseResult<()> {
    let reply = match commands.handle_command(msg.chat.id.0, cmd).await {
        Ok(reply) => reply,
        Err(e) => {
            warn!("Command failed: {}", e);
            reply_for_error(&e)
        }
    };
    bot.send_message(msg.chat.id, reply).await?;
    Ok(())
}

async fn on_callback(bot: Bot, q: CallbackQuery, commands: Arc<CommandService>) -> ResponseResult<()> {
    bot.answer_callback_query(q.id.clone()).await?;

    let Some(data) = q.data.as_deref() else {
        return Ok(());
    };
    let reply = match commands.handle_action(q.from.id.0 as i64, data).await {
        Ok(reply) => reply,
        Err(e) => {
            warn!("Action {} failed: {}", data, e);
            reply_for_error(&e)
        }
    };
    bot.send_message(ChatId(commands.admin_id()), reply).await?;
    Ok(())
}

/// Runs the update dispatcher: admin commands and the confirm/cancel buttons.
pub struct TelegramService {
    id: Uuid,
    bot: Bot,
    commands: Arc<CommandService>,
    shutdown: CancellationToken,
}

impl TelegramService {
    pub fn new(bot: Bot, commands: Arc<CommandService>, shutdown: CancellationToken) -> Self {
        Self {
            id: Uuid::new_v4(),
            bot,
            commands,
            shutdown,
        }
    }
}

#[async_trait]
impl Actor for TelegramService {
    fn id(&self) -> Uuid {
        self.id
    }

    fn name(&self) -> ActorType {
        ActorType::TelegramActor
    }

    async fn run(&mut self, supervisor_tx: mpsc::Sender<ControlMessage>) -> Result<()> {
        info!("Starting Telegram dispatcher");
        let heartbeat_handle = self.spawn_heartbeat(supervisor_tx.clone());

        let handler = dptree::entry()
            .branch(
                Update::filter_message()
                    .filter_command::<AdminCommand>()
                    .endpoint(on_command),
            )
            .branch(Update::filter_callback_query().endpoint(on_callback));

        let mut dispatcher = Dispatcher::builder(self.bot.clone(), handler)
            .dependencies(dptree::deps![self.commands.clone()])
            .default_handler(|_| async {})
            .build();

        let dispatcher_token = dispatcher.shutdown_token();
        let stop = self.shutdown.clone();
        let watcher = tokio::spawn(async move {
            stop.cancelled().await;
            match dispatcher_token.shutdown() {
                Ok(done) => done.await,
                Err(e) => error!("Dispatcher shutdown: {}", e),
            }
        });

        dispatcher.dispatch().await;

        watcher.abort();
        heartbeat_handle.abort();
        info!("Telegram dispatcher stopped.");
        supervisor_tx.send(ControlMessage::Shutdown(self.id)).await?;
        Ok(())
    }
}
