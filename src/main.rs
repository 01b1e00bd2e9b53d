mod quiz;
mod store;

use std::sync::Arc;

use async_trait::async_trait;
use chatgpt::{client::ChatGPT, config::ChatGPTEngine};
use dotenv::dotenv;
use teloxide::{
    prelude::*,
    types::{CallbackQuery, ChatAction, ChatId, InlineKeyboardButton, InlineKeyboardMarkup},
    utils::command::BotCommands,
};

use quiz::oracle::ChatGptOracle;
use quiz::session::{Presenter, SessionController, SessionError};
use quiz::{Level, UserId};
use store::MemoryStore;

type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

const START_PROMPT: &str = "How many words would you like to learn today?";
const PLAY_BUTTON: &str = "Let's play";
const EASIER_BUTTON: &str = "Give me easier words";
const HARDER_BUTTON: &str = "Give me harder words";
const GENERIC_ERROR: &str = "An error occurred. Please try again.";
const STALE_ANSWER: &str = "That question is no longer active. Press \"Let's play\" to continue!";

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase")]
enum Command {
    #[command(description = "pick new words to learn")]
    Start,
}

#[tokio::main]
async fn main() {
    dotenv().expect("Failed to load .env file");
    let chatgpt_api_key = std::env::var("CHATGPT_API_KEY").expect("CHATGPT_API_KEY is not set");

    pretty_env_logger::init();
    log::info!("Starting vocabulary tutor bot...");

    let bot = Bot::from_env();

    let gpt = {
        let mut gpt = ChatGPT::new(chatgpt_api_key).expect("Unable to connect with ChatGPT");

        gpt.config.engine = ChatGPTEngine::Gpt35Turbo;
        gpt.config.timeout = std::time::Duration::from_secs(15);

        gpt
    };

    let store = Arc::new(MemoryStore::new());
    let oracle = Arc::new(ChatGptOracle::new(gpt));
    let controller = Arc::new(SessionController::new(store, oracle));

    let handler = dptree::entry()
        .branch(
            Update::filter_message()
                .filter_command::<Command>()
                .endpoint(handle_command),
        )
        .branch(Update::filter_callback_query().endpoint(handle_callback));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![controller])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

async fn handle_command(bot: Bot, msg: Message, cmd: Command) -> HandlerResult {
    match cmd {
        Command::Start => {
            let keyboard = InlineKeyboardMarkup::new([2, 3, 4].map(|n| {
                vec![InlineKeyboardButton::callback(
                    n.to_string(),
                    format!("action:learn_words:{n}:medium"),
                )]
            }));
            bot.send_message(msg.chat.id, START_PROMPT)
                .reply_markup(keyboard)
                .await?;
        }
    }
    Ok(())
}

async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    controller: Arc<SessionController>,
) -> HandlerResult {
    // Stop the button spinner regardless of what the press turns into.
    bot.answer_callback_query(q.id.clone()).await?;

    let Some(data) = q.data.as_deref() else {
        return Ok(());
    };
    let Some(message) = q.message.as_ref() else {
        return Ok(());
    };
    let chat_id = message.chat.id;
    let user = UserId(q.from.id.0);

    if let Some(request) = parse_learn_words(data) {
        learn_words(&bot, chat_id, user, request, &controller).await
    } else if let Some(seed_level) = parse_start_game(data) {
        start_game(&bot, chat_id, user, seed_level, &controller).await
    } else if let Some(index) = parse_answer(data) {
        answer(&bot, chat_id, user, index, &controller).await
    } else {
        log::debug!("ignoring unknown callback data: {data}");
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LearnWordsRequest {
    count: usize,
    level: Level,
}

fn parse_learn_words(data: &str) -> Option<LearnWordsRequest> {
    let rest = data.strip_prefix("action:learn_words:")?;
    let (count, level) = rest.split_once(':')?;
    Some(LearnWordsRequest {
        count: count.parse().ok()?,
        level: level.parse().ok()?,
    })
}

fn parse_start_game(data: &str) -> Option<Level> {
    if data == "action:start_game" {
        return Some(Level::Medium);
    }
    data.strip_prefix("action:start_game:")?.parse().ok()
}

fn parse_answer(data: &str) -> Option<usize> {
    data.strip_prefix("answer_")?.parse().ok()
}

async fn learn_words(
    bot: &Bot,
    chat_id: ChatId,
    user: UserId,
    request: LearnWordsRequest,
    controller: &SessionController,
) -> HandlerResult {
    // Word suggestion takes a while; the typing indicator is cosmetic, so
    // ignore a failure to send it.
    let _ = bot.send_chat_action(chat_id, ChatAction::Typing).await;

    match controller.seed_words(user, request.count, request.level).await {
        Ok(words) => {
            let keyboard = InlineKeyboardMarkup::new(vec![
                vec![InlineKeyboardButton::callback(
                    PLAY_BUTTON,
                    format!("action:start_game:{}", request.level),
                )],
                vec![InlineKeyboardButton::callback(
                    EASIER_BUTTON,
                    format!("action:learn_words:{}:easy", request.count),
                )],
                vec![InlineKeyboardButton::callback(
                    HARDER_BUTTON,
                    format!("action:learn_words:{}:hard", request.count),
                )],
            ]);
            let text = format!(
                "Here are {} words for you to learn: \n\n{}",
                words.len(),
                words.join(", ")
            );
            bot.send_message(chat_id, text).reply_markup(keyboard).await?;
        }
        Err(err) => {
            log::error!("learn_words for user {user} failed: {err}");
            bot.send_message(chat_id, GENERIC_ERROR).await?;
        }
    }
    Ok(())
}

async fn start_game(
    bot: &Bot,
    chat_id: ChatId,
    user: UserId,
    seed_level: Level,
    controller: &SessionController,
) -> HandlerResult {
    let _ = bot.send_chat_action(chat_id, ChatAction::Typing).await;

    let presenter = TelegramPresenter {
        bot: bot.clone(),
        chat_id,
    };
    if let Err(err) = controller.start_quiz(user, seed_level, &presenter).await {
        log::error!("start_quiz for user {user} failed: {err}");
        bot.send_message(chat_id, GENERIC_ERROR).await?;
    }
    Ok(())
}

async fn answer(
    bot: &Bot,
    chat_id: ChatId,
    user: UserId,
    index: usize,
    controller: &SessionController,
) -> HandlerResult {
    // Answering may trigger a follow-up generation round trip.
    let _ = bot.send_chat_action(chat_id, ChatAction::Typing).await;

    let presenter = TelegramPresenter {
        bot: bot.clone(),
        chat_id,
    };
    match controller.record_answer(user, index, &presenter).await {
        Ok(()) => {}
        Err(SessionError::NoActiveQuestion) => {
            bot.send_message(chat_id, STALE_ANSWER).await?;
        }
        Err(err) => {
            log::error!("record_answer for user {user} failed: {err}");
            bot.send_message(chat_id, GENERIC_ERROR).await?;
        }
    }
    Ok(())
}

/// Renders core emissions as Telegram messages. Options become an inline
/// keyboard whose callback data carries the option index.
struct TelegramPresenter {
    bot: Bot,
    chat_id: ChatId,
}

#[async_trait]
impl Presenter for TelegramPresenter {
    async fn present_question(&self, prompt: &str, options: &[String]) {
        let keyboard = InlineKeyboardMarkup::new(options.iter().enumerate().map(
            |(index, option)| {
                vec![InlineKeyboardButton::callback(
                    option.clone(),
                    format!("answer_{index}"),
                )]
            },
        ));
        if let Err(err) = self
            .bot
            .send_message(self.chat_id, prompt)
            .reply_markup(keyboard)
            .await
        {
            log::warn!("failed to deliver a question to chat {}: {err}", self.chat_id);
        }
    }

    async fn present_feedback(&self, text: &str) {
        if let Err(err) = self.bot.send_message(self.chat_id, text).await {
            log::warn!("failed to deliver feedback to chat {}: {err}", self.chat_id);
        }
    }

    async fn present_completion(&self, text: &str) {
        if let Err(err) = self.bot.send_message(self.chat_id, text).await {
            log::warn!(
                "failed to deliver the completion notice to chat {}: {err}",
                self.chat_id
            );
        }
    }
}
