//! Opening assistant messages per conversation type and language

use parley_ai::ConversationType;
use parley_voice::Language;

/// Greeting seeded as the first assistant message.
///
/// Custom conversation types use the assistant greeting.
pub fn greeting(conversation_type: &ConversationType, language: Language) -> &'static str {
    match conversation_type {
        ConversationType::PatientHistory => history_greeting(language),
        ConversationType::PatientAssistant | ConversationType::Custom(_) => {
            assistant_greeting(language)
        }
    }
}

fn assistant_greeting(language: Language) -> &'static str {
    match language {
        Language::EnglishIndia => {
            "Hello! I'm your digital health assistant. I can help you with explaining medical reports, scheduling appointments, medication reminders, symptom checking, and health information. How can I assist you today?"
        }
        Language::Hindi => {
            "नमस्ते! मैं आपका डिजिटल स्वास्थ्य सहायक हूं। मैं मेडिकल रिपोर्ट समझाने, अपॉइंटमेंट शेड्यूल करने, दवा रिमाइंडर, लक्षण जांच और स्वास्थ्य जानकारी में आपकी मदद कर सकता हूं। आज मैं आपकी कैसे मदद कर सकता हूं?"
        }
        Language::Tamil => {
            "வணக்கம்! நான் உங்கள் டிஜிட்டல் சுகாதார உதவியாளர். மருத்துவ அறிக்கைகளை விளக்குதல், சந்திப்புகளை திட்டமிடுதல், மருந்து நினைவூட்டல்கள், அறிகுறி சோதனை மற்றும் சுகாதார தகவல்களில் நான் உங்களுக்கு உதவ முடியும். இன்று நான் உங்களுக்கு எப்படி உதவ முடியும்?"
        }
        Language::Telugu => {
            "నమస్కారం! నేను మీ డిజిటల్ ఆరోగ్య సహాయకుడిని. వైద్య నివేదికలను వివరించడం, అపాయింట్‌మెంట్‌లు షెడ్యూల్ చేయడం, మందుల రిమైండర్‌లు, లక్షణ తనిఖీ మరియు ఆరోగ్య సమాచారంలో నేను మీకు సహాయం చేయగలను. ఈరోజు నేను మీకు ఎలా సహాయం చేయగలను?"
        }
        Language::Bengali => {
            "নমস্কার! আমি আপনার ডিজিটাল স্বাস্থ্য সহায়ক। আমি মেডিকেল রিপোর্ট ব্যাখ্যা করা, অ্যাপয়েন্টমেন্ট শিডিউল করা, ওষুধের অনুস্মারক, লক্ষণ পরীক্ষা এবং স্বাস্থ্য তথ্যে আপনাকে সাহায্য করতে পারি। আজ আমি আপনাকে কীভাবে সাহায্য করতে পারি?"
        }
        Language::Marathi => {
            "नमस्कार! मी तुमचा डिजिटल आरोग्य सहाय्यक आहे। मी वैद्यकीय अहवाल समजावून सांगणे, भेटी शेड्यूल करणे, औषध स्मरणपत्रे, लक्षण तपासणी आणि आरोग्य माहितीमध्ये तुम्हाला मदत करू शकतो। आज मी तुम्हाला कशी मदत करू शकतो?"
        }
        Language::Gujarati => {
            "નમસ્તે! હું તમારો ડિજિટલ આરોગ્ય સહાયક છું. હું તબીબી અહેવાલો સમજાવવા, મુલાકાતો શેડ્યૂલ કરવા, દવા રીમાઇન્ડર્સ, લક્ષણ તપાસ અને આરોગ્ય માહિતીમાં તમને મદદ કરી શકું છું. આજે હું તમને કેવી રીતે મદદ કરી શકું?"
        }
        Language::Kannada => {
            "ನಮಸ್ಕಾರ! ನಾನು ನಿಮ್ಮ ಡಿಜಿಟಲ್ ಆರೋಗ್ಯ ಸಹಾಯಕ. ವೈದ್ಯಕೀಯ ವರದಿಗಳನ್ನು ವಿವರಿಸುವುದು, ಭೇಟಿಗಳನ್ನು ನಿಗದಿಪಡಿಸುವುದು, ಔಷಧಿ ಜ್ಞಾಪನೆಗಳು, ರೋಗಲಕ್ಷಣ ಪರಿಶೀಲನೆ ಮತ್ತು ಆರೋಗ್ಯ ಮಾಹಿತಿಯಲ್ಲಿ ನಾನು ನಿಮಗೆ ಸಹಾಯ ಮಾಡಬಲ್ಲೆ. ಇಂದು ನಾನು ನಿಮಗೆ ಹೇಗೆ ಸಹಾಯ ಮಾಡಬಹುದು?"
        }
    }
}

fn history_greeting(language: Language) -> &'static str {
    match language {
        Language::EnglishIndia => {
            "Hello! I'm here to help collect some information before your appointment. This will help your doctor provide better care. What brings you in today?"
        }
        Language::Hindi => {
            "नमस्ते! मैं आपकी अपॉइंटमेंट से पहले कुछ जानकारी एकत्र करने में मदद करने के लिए यहां हूं। यह आपके डॉक्टर को बेहतर देखभाल प्रदान करने में मदद करेगा। आज आप क्यों आए हैं?"
        }
        Language::Tamil => {
            "வணக்கம்! உங்கள் சந்திப்புக்கு முன் சில தகவல்களை சேகரிக்க நான் இங்கு உதவ வந்துள்ளேன். இது உங்கள் மருத்துவருக்கு சிறந்த சிகிச்சை அளிக்க உதவும். இன்று உங்களுக்கு என்ன பிரச்சனை?"
        }
        Language::Telugu => {
            "నమస్కారం! మీ అపాయింట్మెంట్ ముందు కొంత సమాచారం సేకరించడానికి నేను ఇక్కడ సహాయం చేయడానికి వచ్చాను. ఇది మీ డాక్టర్‌కు మెరుగైన సంరక్షణ అందించడంలో సహాయపడుతుంది. ఈరోజు మీకు ఏమి సమస్య?"
        }
        Language::Bengali => {
            "নমস্কার! আপনার অ্যাপয়েন্টমেন্টের আগে কিছু তথ্য সংগ্রহ করতে আমি এখানে সাহায্য করতে এসেছি। এটি আপনার ডাক্তারকে আরও ভাল যত্ন প্রদান করতে সাহায্য করবে। আজ আপনার কী সমস্যা?"
        }
        Language::Marathi => {
            "नमस्कार! तुमच्या भेटीपूर्वी काही माहिती गोळा करण्यात मदत करण्यासाठी मी येथे आहे. यामुळे तुमच्या डॉक्टरांना चांगली काळजी घेण्यास मदत होईल. आज तुम्हाला काय समस्या आहे?"
        }
        Language::Gujarati => {
            "નમસ્તે! તમારી મુલાકાત પહેલાં કેટલીક માહિતી એકત્રિત કરવામાં મદદ કરવા હું અહીં છું. આ તમારા ડૉક્ટરને વધુ સારી સંભાળ પૂરી પાડવામાં મદદ કરશે. આજે તમને શું સમસ્યા છે?"
        }
        Language::Kannada => {
            "ನಮಸ್ಕಾರ! ನಿಮ್ಮ ಭೇಟಿಯ ಮೊದಲು ಕೆಲವು ಮಾಹಿತಿಯನ್ನು ಸಂಗ್ರಹಿಸಲು ಸಹಾಯ ಮಾಡಲು ನಾನು ಇಲ್ಲಿದ್ದೇನೆ. ಇದು ನಿಮ್ಮ ವೈದ್ಯರಿಗೆ ಉತ್ತಮ ಆರೈಕೆ ನೀಡಲು ಸಹಾಯ ಮಾಡುತ್ತದೆ. ಇಂದು ನಿಮಗೆ ಏನು ಸಮಸ್ಯೆ?"
        }
    }
}
